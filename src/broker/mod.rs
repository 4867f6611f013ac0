//! Authorization broker
//!
//! [`AuthorizationInitiator`] turns "connect provider X" into a redirect to the
//! provider's authorize endpoint carrying a freshly minted state token.
//! [`callback::consume_callback_state`] is the matching precondition for the
//! callback leg.

pub mod callback;
pub mod error;
pub mod initiator;

pub use callback::{callback_error_code, consume_callback_state};
pub use error::BrokerError;
pub use initiator::AuthorizationInitiator;
