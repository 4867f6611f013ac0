// Centralized logging helpers for the broker's recurring log lines
use log::{debug, info, warn};

pub struct LoggingHelper;

/// Short, non-reversible prefix of a state token for log correlation
fn token_hint(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

impl LoggingHelper {
    /// Log provider table load
    pub fn log_provider_table_loaded(count: usize) {
        info!("🔧 Loaded integration provider table with {count} providers");
    }

    /// Log provider initialization status
    pub fn log_provider_init(provider_key: &str, display_name: &str, configured: bool) {
        if configured {
            info!("✅ {display_name} integration configured ({provider_key})");
        } else {
            info!("❌ {display_name} integration not configured - missing client id");
        }
    }

    pub fn log_state_collision(attempt: u32) {
        warn!("State token collision on attempt {attempt}, regenerating");
    }

    pub fn log_state_issued(token: &str, bound: bool) {
        debug!(
            "Issued state {}… (bound to user: {bound})",
            token_hint(token)
        );
    }

    pub fn log_state_consumed(token: &str) {
        debug!("Consumed state {}…", token_hint(token));
    }

    pub fn log_states_reaped(removed: usize) {
        if removed > 0 {
            info!("🧹 Reaped {removed} expired OAuth states");
        } else {
            debug!("State reaper found nothing to remove");
        }
    }

    /// Log a successful authorization redirect
    pub fn log_initiation_redirect(provider_key: &str, scopes: Option<&str>) {
        info!(
            "🔍 Redirecting to {provider_key} authorization with scopes: {}",
            scopes.unwrap_or("<none>")
        );
    }

    /// Log a rejected initiation and the code the browser receives
    pub fn log_initiation_failed(provider_key: &str, error_code: &str, reason: &dyn std::fmt::Display) {
        warn!("Integration {provider_key} initiation failed ({error_code}): {reason}");
    }
}
