//! Single-use CSRF state tokens for the authorization-code flow
//!
//! A state token is minted right before redirecting the browser to a provider and
//! must be presented back, once, on the callback. Consumption and the expiry check
//! happen in one atomic step so two racing callbacks cannot both succeed.

pub mod clock;
pub mod reaper;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use reaper::reap_periodically;
pub use store::{MemoryStateStore, OAuthState, StateError, StateStore, StateStoreError};
pub use token::{OsTokenSource, SeededTokenSource, TokenSource};
