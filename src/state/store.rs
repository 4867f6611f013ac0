//! CSRF state storage with consume-once semantics

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use super::clock::{Clock, SystemClock};
use super::token::{OsTokenSource, TokenSource};
use crate::identity::UserId;
use crate::utils::logging::LoggingHelper;

/// Default state lifetime
pub const DEFAULT_STATE_TTL_MINUTES: i64 = 10;

/// Default number of generation attempts before `issue` gives up on collisions
pub const DEFAULT_MAX_ISSUE_ATTEMPTS: u32 = 5;

/// Stored authorization state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub bound_user_id: Option<UserId>,
    pub consumed: bool,
}

impl OAuthState {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Unconsumed and unexpired
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.consumed && !self.is_expired_at(now)
    }
}

/// Why a presented state token was rejected. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("state token not found")]
    NotFound,
    #[error("state token expired")]
    Expired,
    #[error("state token already consumed")]
    AlreadyConsumed,
    #[error("state token bound to a different user")]
    UserMismatch,
}

impl StateError {
    /// Only an expired state may prompt the user to start over
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Expired)
    }

    /// Stable code safe to place in a redirect URL
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "state_not_found",
            Self::Expired => "state_expired",
            Self::AlreadyConsumed => "state_already_used",
            Self::UserMismatch => "state_user_mismatch",
        }
    }
}

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error(transparent)]
    Rejected(#[from] StateError),
    #[error("could not mint a unique state token after {0} attempts")]
    Exhausted(u32),
    #[error("state storage failure: {0}")]
    Storage(String),
}

/// Issues and consumes single-use state tokens.
///
/// There is deliberately no update or delete-by-key operation besides
/// consumption and expiry reaping.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Mint and persist a new state token
    ///
    /// # Errors
    ///
    /// Returns `Exhausted` if no unique token could be generated, or `Storage`
    /// if the backing store fails
    async fn issue(&self, bound_user_id: Option<UserId>) -> Result<String, StateStoreError>;

    /// Atomically check and consume a state token, returning its bound user id
    ///
    /// # Errors
    ///
    /// Returns `Rejected` with the reason the token is unusable, or `Storage`
    /// if the backing store fails
    async fn validate_and_consume(
        &self,
        token: &str,
        caller_user_id: Option<UserId>,
    ) -> Result<Option<UserId>, StateStoreError>;

    /// Physically delete expired entries, returning how many were removed
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing store fails
    async fn reap_expired(&self) -> Result<usize, StateStoreError>;
}

/// In-process state store.
///
/// Each `DashMap` shard lock makes the lookup, expiry check and consumed flip a
/// single critical section per token.
pub struct MemoryStateStore {
    states: DashMap<String, OAuthState>,
    ttl: Duration,
    max_issue_attempts: u32,
    tokens: Arc<dyn TokenSource>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_STATE_TTL_MINUTES))
    }
}

impl MemoryStateStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            states: DashMap::new(),
            ttl,
            max_issue_attempts: DEFAULT_MAX_ISSUE_ATTEMPTS,
            tokens: Arc::new(OsTokenSource),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_max_issue_attempts(mut self, attempts: u32) -> Self {
        self.max_issue_attempts = attempts.max(1);
        self
    }

    /// Number of stored entries, live or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Snapshot of a stored entry
    #[must_use]
    pub fn get(&self, token: &str) -> Option<OAuthState> {
        self.states.get(token).map(|entry| entry.value().clone())
    }

    fn new_state(&self, token: String, bound_user_id: Option<UserId>) -> OAuthState {
        let created_at = self.clock.now();
        OAuthState {
            token,
            created_at,
            expires_at: created_at + self.ttl,
            bound_user_id,
            consumed: false,
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn issue(&self, bound_user_id: Option<UserId>) -> Result<String, StateStoreError> {
        for attempt in 1..=self.max_issue_attempts {
            let token = self.tokens.next_token();
            let now = self.clock.now();

            match self.states.entry(token.clone()) {
                Entry::Occupied(mut occupied) => {
                    if occupied.get().is_live_at(now) {
                        LoggingHelper::log_state_collision(attempt);
                        continue;
                    }
                    // Dead entry under the same key: safe to recycle.
                    occupied.insert(self.new_state(token.clone(), bound_user_id));
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(self.new_state(token.clone(), bound_user_id));
                }
            }

            LoggingHelper::log_state_issued(&token, bound_user_id.is_some());
            return Ok(token);
        }

        Err(StateStoreError::Exhausted(self.max_issue_attempts))
    }

    async fn validate_and_consume(
        &self,
        token: &str,
        caller_user_id: Option<UserId>,
    ) -> Result<Option<UserId>, StateStoreError> {
        let now = self.clock.now();

        // The shard write lock is held until `state` drops.
        let Some(mut state) = self.states.get_mut(token) else {
            return Err(StateError::NotFound.into());
        };

        // Consumed wins over expired.
        if state.consumed {
            return Err(StateError::AlreadyConsumed.into());
        }
        if state.is_expired_at(now) {
            return Err(StateError::Expired.into());
        }
        if let (Some(bound), Some(caller)) = (state.bound_user_id, caller_user_id) {
            if bound != caller {
                return Err(StateError::UserMismatch.into());
            }
        }

        state.consumed = true;
        LoggingHelper::log_state_consumed(token);
        Ok(state.bound_user_id)
    }

    async fn reap_expired(&self) -> Result<usize, StateStoreError> {
        let now = self.clock.now();
        let before = self.states.len();
        self.states.retain(|_, state| !state.is_expired_at(now));
        let removed = before.saturating_sub(self.states.len());
        LoggingHelper::log_states_reaped(removed);
        Ok(removed)
    }
}
