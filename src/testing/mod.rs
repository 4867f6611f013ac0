//! Shared test utilities
//!
//! - [`fixtures`] - settings, session tokens and a fully wired broker
//! - [`mock`] - instrumented and failing store implementations
//!
//! ```rust
//! use linkrs::testing::TestFixtures;
//!
//! let broker = TestFixtures::broker();
//! let token = TestFixtures::session_token();
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::{TestBroker, TestFixtures};
pub use mock::{CountingStateStore, FailingIdentityStore, FailingStateStore};

/// Common test constants
pub mod constants {
    /// Public base URL used by test settings
    pub const TEST_APP_BASE_URL: &str = "https://app.example.com";

    /// Test HMAC session signing key (256 bits)
    pub const TEST_SIGNING_SECRET: &[u8] = b"test_key_32_bytes_long_for_test_";

    /// External identity of the default test user
    pub const TEST_EXTERNAL_USER_ID: &str = "user_2abcDEF";

    /// Default test email address
    pub const TEST_EMAIL: &str = "test@example.com";

    /// Client id used by fixture providers
    pub const TEST_CLIENT_ID: &str = "abc123";
}
