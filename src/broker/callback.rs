//! State-consumption precondition for the provider callback

use crate::identity::UserId;
use crate::state::{StateError, StateStore, StateStoreError};

/// Validate and consume the `state` query parameter of a provider callback.
///
/// A missing or empty parameter is treated as an unknown token.
///
/// # Errors
///
/// Returns the store's rejection reason, or a storage failure
pub async fn consume_callback_state(
    store: &dyn StateStore,
    state_param: Option<&str>,
    caller_user_id: Option<UserId>,
) -> Result<Option<UserId>, StateStoreError> {
    let token = state_param
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(StateError::NotFound)?;

    store.validate_and_consume(token, caller_user_id).await
}

/// Redirect-safe code for a failed callback, e.g. `github_state_expired`
#[must_use]
pub fn callback_error_code(provider_key: &str, error: &StateStoreError) -> String {
    match error {
        StateStoreError::Rejected(reason) => format!("{provider_key}_{}", reason.code()),
        StateStoreError::Exhausted(_) | StateStoreError::Storage(_) => "oauth_failed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ManualClock, MemoryStateStore};
    use crate::testing::CountingStateStore;
    use chrono::Duration;
    use std::sync::Arc;
    use uuid::Uuid;

    fn rejection(result: Result<Option<UserId>, StateStoreError>) -> StateError {
        match result {
            Err(StateStoreError::Rejected(reason)) => reason,
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_state_param_never_reaches_store() {
        let store = CountingStateStore::default();
        assert_eq!(
            rejection(consume_callback_state(&store, None, None).await),
            StateError::NotFound
        );
        assert_eq!(
            rejection(consume_callback_state(&store, Some("  "), None).await),
            StateError::NotFound
        );
        assert_eq!(store.consume_calls(), 0);
    }

    #[tokio::test]
    async fn test_consume_once_then_already_used() {
        let store = MemoryStateStore::default();
        let user = Uuid::new_v4();
        let token = store.issue(Some(user)).await.unwrap();

        let bound = consume_callback_state(&store, Some(&token), Some(user))
            .await
            .unwrap();
        assert_eq!(bound, Some(user));

        let err = consume_callback_state(&store, Some(&token), Some(user))
            .await
            .unwrap_err();
        assert_eq!(callback_error_code("github", &err), "github_state_already_used");
    }

    #[tokio::test]
    async fn test_expired_state_is_retryable() {
        let clock = Arc::new(ManualClock::default());
        let store = MemoryStateStore::new(Duration::minutes(10)).with_clock(clock.clone());
        let token = store.issue(None).await.unwrap();

        clock.advance(Duration::minutes(11));

        let err = consume_callback_state(&store, Some(&token), None)
            .await
            .unwrap_err();
        assert_eq!(callback_error_code("linear", &err), "linear_state_expired");
        assert!(rejection(Err(err)).is_retryable());
    }

    #[tokio::test]
    async fn test_user_mismatch_code() {
        let store = MemoryStateStore::default();
        let token = store.issue(Some(Uuid::new_v4())).await.unwrap();

        let err = consume_callback_state(&store, Some(&token), Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(callback_error_code("jira", &err), "jira_state_user_mismatch");
    }

    #[test]
    fn test_storage_failures_map_to_generic_code() {
        let err = StateStoreError::Storage("connection reset".to_string());
        assert_eq!(callback_error_code("github", &err), "oauth_failed");
    }
}
