//! Periodic purge of expired state rows. Correctness never depends on it.

use log::warn;
use std::sync::Arc;
use std::time::Duration;

use super::StateStore;

/// Reap expired states every `period`, forever. A zero period disables reaping.
pub async fn reap_periodically(store: Arc<dyn StateStore>, period: Duration) {
    if period.is_zero() {
        return;
    }

    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = store.reap_expired().await {
            warn!("State reaper run failed: {e}");
        }
    }
}
