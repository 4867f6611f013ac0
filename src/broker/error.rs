use thiserror::Error;

use crate::identity::{AuthError, SyncError};
use crate::registry::ConfigurationError;
use crate::state::StateStoreError;

/// Failures on the initiation path. Only [`BrokerError::error_code`] output may
/// reach a redirect URL; the `Display` text is for server logs.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl From<SyncError> for BrokerError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::Auth(auth) => Self::Auth(auth),
            SyncError::Store(store) => Self::Unexpected(store.to_string()),
        }
    }
}

impl From<StateStoreError> for BrokerError {
    fn from(error: StateStoreError) -> Self {
        Self::Unexpected(error.to_string())
    }
}

impl BrokerError {
    /// Safe code for the integrations page `error` parameter
    #[must_use]
    pub fn error_code(&self, provider_key: &str) -> String {
        match self {
            Self::Configuration(_) => format!("{provider_key}_not_configured"),
            Self::Auth(_) | Self::Unexpected(_) => "oauth_failed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityStoreError;
    use crate::state::StateError;

    #[test]
    fn test_error_codes_never_carry_detail() {
        let missing = BrokerError::from(ConfigurationError::MissingClientId {
            provider: "github".to_string(),
            env_var: "GITHUB_CLIENT_ID".to_string(),
        });
        assert_eq!(missing.error_code("github"), "github_not_configured");

        let unknown = BrokerError::from(ConfigurationError::UnknownProvider("nope".to_string()));
        assert_eq!(unknown.error_code("nope"), "nope_not_configured");

        let storage = BrokerError::from(StateStoreError::Storage("disk on fire".to_string()));
        assert_eq!(storage.error_code("github"), "oauth_failed");
        assert!(storage.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_sync_error_conversion() {
        let auth = BrokerError::from(SyncError::Auth(AuthError::MissingCredential));
        assert!(matches!(auth, BrokerError::Auth(AuthError::MissingCredential)));

        let store = BrokerError::from(SyncError::Store(IdentityStoreError::Storage(
            "timeout".to_string(),
        )));
        assert!(matches!(store, BrokerError::Unexpected(_)));

        let rejected = BrokerError::from(StateStoreError::from(StateError::Expired));
        assert_eq!(rejected.error_code("gitlab"), "oauth_failed");
    }
}
