//! Internal user records keyed by external identity id

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use super::User;

#[derive(Debug, Error)]
pub enum IdentityStoreError {
    #[error("identity storage failure: {0}")]
    Storage(String),
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert the user if absent, else update mutable fields. Must be a single
    /// atomic operation keyed on `external_user_id`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing store fails
    async fn upsert(
        &self,
        external_user_id: &str,
        email: Option<&str>,
    ) -> Result<User, IdentityStoreError>;

    /// # Errors
    ///
    /// Returns `Storage` if the backing store fails
    async fn find_by_external_id(
        &self,
        external_user_id: &str,
    ) -> Result<Option<User>, IdentityStoreError>;
}

/// In-process identity store; the `DashMap` entry lock serialises concurrent
/// first-time upserts for the same external id.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    users: DashMap<String, User>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn upsert(
        &self,
        external_user_id: &str,
        email: Option<&str>,
    ) -> Result<User, IdentityStoreError> {
        let now = Utc::now();
        let user = match self.users.entry(external_user_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let user = occupied.get_mut();
                if let Some(email) = email {
                    if user.email.as_deref() != Some(email) {
                        user.email = Some(email.to_string());
                        user.updated_at = now;
                    }
                }
                user.clone()
            }
            Entry::Vacant(vacant) => {
                let user = User {
                    internal_id: Uuid::new_v4(),
                    external_user_id: external_user_id.to_string(),
                    email: email.map(ToString::to_string),
                    created_at: now,
                    updated_at: now,
                };
                log::info!("Created user {} for new external identity", user.internal_id);
                vacant.insert(user).clone()
            }
        };
        Ok(user)
    }

    async fn find_by_external_id(
        &self,
        external_user_id: &str,
    ) -> Result<Option<User>, IdentityStoreError> {
        Ok(self
            .users
            .get(external_user_id)
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let store = MemoryIdentityStore::new();

        let created = store.upsert("user_1", None).await.unwrap();
        assert_eq!(created.email, None);

        let updated = store.upsert("user_1", Some("a@example.com")).await.unwrap();
        assert_eq!(updated.internal_id, created.internal_id);
        assert_eq!(updated.email.as_deref(), Some("a@example.com"));
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_email_keeps_existing() {
        let store = MemoryIdentityStore::new();
        store.upsert("user_1", Some("a@example.com")).await.unwrap();

        let user = store.upsert("user_1", None).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn test_find_by_external_id() {
        let store = MemoryIdentityStore::new();
        assert!(store.find_by_external_id("ghost").await.unwrap().is_none());

        let user = store.upsert("user_1", None).await.unwrap();
        assert_eq!(store.find_by_external_id("user_1").await.unwrap(), Some(user));
    }
}
