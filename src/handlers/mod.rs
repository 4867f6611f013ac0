// HTTP request handlers
pub mod health;
pub mod integrations;

pub use health::health;
pub use integrations::connect_integration;
