//! Verified identity of the caller
//!
//! A session credential is verified by a [`TokenVerifier`] into [`VerifiedClaims`],
//! and [`IdentitySync`] upserts the matching internal [`User`] into an
//! [`IdentityStore`].

pub mod store;
pub mod sync;
pub mod verifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use store::{IdentityStore, IdentityStoreError, MemoryIdentityStore};
pub use sync::{IdentitySync, SyncError};
pub use verifier::{shared_verifier, HmacTokenVerifier, TokenVerifier};

/// Internal user identifier
pub type UserId = Uuid;

/// Output of a successful credential verification. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedClaims {
    pub external_user_id: String,
    pub email: Option<String>,
    pub raw_claims: serde_json::Value,
}

/// Internal user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub internal_id: UserId,
    /// Unique and immutable after creation
    pub external_user_id: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Credential problems. The detail is for server logs only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no session credential presented")]
    MissingCredential,
    #[error("invalid session credential: {0}")]
    InvalidCredential(String),
}
