//! Store doubles for exercising the broker's failure paths

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::identity::{IdentityStore, IdentityStoreError, User, UserId};
use crate::state::{MemoryStateStore, StateStore, StateStoreError};

/// Wraps a [`MemoryStateStore`] and counts every call into it
#[derive(Default)]
pub struct CountingStateStore {
    inner: MemoryStateStore,
    issue_calls: AtomicUsize,
    consume_calls: AtomicUsize,
}

impl CountingStateStore {
    #[must_use]
    pub fn new(inner: MemoryStateStore) -> Self {
        Self {
            inner,
            issue_calls: AtomicUsize::new(0),
            consume_calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn issue_calls(&self) -> usize {
        self.issue_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn consume_calls(&self) -> usize {
        self.consume_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn inner(&self) -> &MemoryStateStore {
        &self.inner
    }
}

#[async_trait]
impl StateStore for CountingStateStore {
    async fn issue(&self, bound_user_id: Option<UserId>) -> Result<String, StateStoreError> {
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.issue(bound_user_id).await
    }

    async fn validate_and_consume(
        &self,
        token: &str,
        caller_user_id: Option<UserId>,
    ) -> Result<Option<UserId>, StateStoreError> {
        self.consume_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.validate_and_consume(token, caller_user_id).await
    }

    async fn reap_expired(&self) -> Result<usize, StateStoreError> {
        self.inner.reap_expired().await
    }
}

/// State store whose backend is always down
pub struct FailingStateStore;

#[async_trait]
impl StateStore for FailingStateStore {
    async fn issue(&self, _bound_user_id: Option<UserId>) -> Result<String, StateStoreError> {
        Err(StateStoreError::Storage("state backend unavailable".to_string()))
    }

    async fn validate_and_consume(
        &self,
        _token: &str,
        _caller_user_id: Option<UserId>,
    ) -> Result<Option<UserId>, StateStoreError> {
        Err(StateStoreError::Storage("state backend unavailable".to_string()))
    }

    async fn reap_expired(&self) -> Result<usize, StateStoreError> {
        Err(StateStoreError::Storage("state backend unavailable".to_string()))
    }
}

/// Identity store whose backend is always down
pub struct FailingIdentityStore;

#[async_trait]
impl IdentityStore for FailingIdentityStore {
    async fn upsert(
        &self,
        _external_user_id: &str,
        _email: Option<&str>,
    ) -> Result<User, IdentityStoreError> {
        Err(IdentityStoreError::Storage("user table locked".to_string()))
    }

    async fn find_by_external_id(
        &self,
        _external_user_id: &str,
    ) -> Result<Option<User>, IdentityStoreError> {
        Err(IdentityStoreError::Storage("user table locked".to_string()))
    }
}
