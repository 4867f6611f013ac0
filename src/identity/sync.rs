//! Keeps the internal user table in step with verified identities

use std::sync::Arc;
use thiserror::Error;

use super::{AuthError, IdentityStore, IdentityStoreError, TokenVerifier, User, VerifiedClaims};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] IdentityStoreError),
}

#[derive(Clone)]
pub struct IdentitySync {
    verifier: Arc<dyn TokenVerifier>,
    store: Arc<dyn IdentityStore>,
}

impl IdentitySync {
    #[must_use]
    pub fn new(verifier: Arc<dyn TokenVerifier>, store: Arc<dyn IdentityStore>) -> Self {
        Self { verifier, store }
    }

    /// Verify the credential and upsert its user. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `Auth` if verification fails, `Store` if the upsert fails
    pub async fn sync(&self, credential: &str) -> Result<User, SyncError> {
        let claims = self.verifier.verify(credential).await?;
        self.sync_claims(&claims).await
    }

    /// Upsert the user for claims that were already verified
    ///
    /// # Errors
    ///
    /// Returns `Store` if the upsert fails
    pub async fn sync_claims(&self, claims: &VerifiedClaims) -> Result<User, SyncError> {
        Ok(self
            .store
            .upsert(&claims.external_user_id, claims.email.as_deref())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{HmacTokenVerifier, MemoryIdentityStore};
    use chrono::Duration;

    const SECRET: &[u8] = b"test_key_32_bytes_long_for_test_";

    fn sync_with_store() -> (IdentitySync, Arc<MemoryIdentityStore>, HmacTokenVerifier) {
        let verifier = HmacTokenVerifier::new(SECRET);
        let store = Arc::new(MemoryIdentityStore::new());
        let sync = IdentitySync::new(Arc::new(verifier.clone()), store.clone());
        (sync, store, verifier)
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let (sync, store, verifier) = sync_with_store();
        let token = verifier
            .issue("user_2abc", Some("dev@example.com"), Duration::hours(1))
            .unwrap();

        let first = sync.sync(&token).await.unwrap();
        let second = sync.sync(&token).await.unwrap();

        assert_eq!(first.internal_id, second.internal_id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sync_rejects_invalid_credential() {
        let (sync, store, _) = sync_with_store();

        assert!(matches!(
            sync.sync("garbage").await,
            Err(SyncError::Auth(AuthError::InvalidCredential(_)))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_sync_creates_one_user() {
        let (sync, store, verifier) = sync_with_store();
        let token = verifier.issue("user_tabs", None, Duration::hours(1)).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let sync = sync.clone();
                let token = token.clone();
                tokio::spawn(async move { sync.sync(&token).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().internal_id);
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.len(), 1);
    }
}
