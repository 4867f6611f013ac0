#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the linkrs application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod broker;
pub mod guard;
pub mod handlers;
pub mod identity;
pub mod registry;
pub mod settings;
pub mod state;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use broker::AuthorizationInitiator;
pub use guard::{session_guard_middleware, SessionGuard};
pub use handlers::{connect_integration, health};
pub use registry::ProviderRegistry;
pub use settings::LinkrsSettings;
