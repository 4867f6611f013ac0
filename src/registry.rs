//! Integration provider registry
//!
//! Static, process-wide table of OAuth integration providers. The table is built
//! once at start-up and never mutated; client ids are resolved lazily at use time
//! because a deployment may intentionally leave some providers unconfigured.

use crate::settings::{LinkrsSettings, ProviderSettings};
use crate::utils::logging::LoggingHelper;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// How a provider expects multiple scopes to be joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeDelimiter {
    #[default]
    Space,
    Comma,
}

impl ScopeDelimiter {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Space => " ",
            Self::Comma => ",",
        }
    }
}

/// Provider configuration problems. Detected per request, never at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider {provider} has no client id (set {env_var})")]
    MissingClientId { provider: String, env_var: String },
    #[error("provider {provider} has an invalid authorization endpoint: {reason}")]
    InvalidEndpoint { provider: String, reason: String },
}

/// Provider-specific OAuth configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub key: String,
    pub display_name: String,
    pub authorization_endpoint: String,
    pub scopes: Vec<String>,
    pub scope_delimiter: ScopeDelimiter,
    pub scope_param: String,
    pub requires_user_binding: bool,
    pub extra_params: BTreeMap<String, String>,
    settings: ProviderSettings,
}

impl ProviderConfig {
    fn from_settings(settings: ProviderSettings) -> Self {
        Self {
            key: settings.name.clone(),
            display_name: settings
                .display_name
                .clone()
                .unwrap_or_else(|| settings.name.clone()),
            authorization_endpoint: settings.authorization_endpoint.clone(),
            scopes: settings.scopes.clone(),
            scope_delimiter: settings.scope_delimiter,
            scope_param: settings.scope_param.clone(),
            requires_user_binding: settings.requires_user_binding,
            extra_params: settings.extra_auth_params.clone(),
            settings,
        }
    }

    /// Resolve the client id for this request
    ///
    /// # Errors
    ///
    /// Returns `MissingClientId` if neither the environment nor the settings carry
    /// a non-empty client id
    pub fn client_id(&self) -> Result<String, ConfigurationError> {
        self.settings
            .get_client_id()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ConfigurationError::MissingClientId {
                provider: self.key.clone(),
                env_var: self.settings.client_id_env_name(),
            })
    }

    /// Fixed redirect URI registered with the provider
    #[must_use]
    pub fn redirect_uri(&self, app_base_url: &str) -> String {
        format!(
            "{}{}",
            app_base_url.trim_end_matches('/'),
            self.settings.callback_path()
        )
    }

    /// Scopes joined with the provider's delimiter, `None` when there are none
    #[must_use]
    pub fn joined_scopes(&self) -> Option<String> {
        if self.scopes.is_empty() {
            None
        } else {
            Some(self.scopes.join(self.scope_delimiter.as_str()))
        }
    }
}

/// Read-only provider table, shared freely across workers
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    /// Build the registry from settings, falling back to the built-in table
    /// when no providers are configured
    #[must_use]
    pub fn from_settings(settings: &LinkrsSettings) -> Self {
        let provider_settings = if settings.providers.is_empty() {
            builtin_providers()
        } else {
            settings.providers.clone()
        };
        let registry = Self::new(provider_settings);
        registry.log_summary();
        registry
    }

    #[must_use]
    pub fn new(provider_settings: Vec<ProviderSettings>) -> Self {
        let providers = provider_settings
            .into_iter()
            .map(|settings| (settings.name.clone(), ProviderConfig::from_settings(settings)))
            .collect();
        Self { providers }
    }

    /// Get provider configuration by key
    ///
    /// # Errors
    ///
    /// Returns `UnknownProvider` for keys that are not registered
    pub fn lookup(&self, key: &str) -> Result<&ProviderConfig, ConfigurationError> {
        self.providers
            .get(key)
            .ok_or_else(|| ConfigurationError::UnknownProvider(key.to_string()))
    }

    /// Registered provider keys in sorted order
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    fn log_summary(&self) {
        LoggingHelper::log_provider_table_loaded(self.providers.len());
        for key in self.keys() {
            if let Some(provider) = self.providers.get(key) {
                LoggingHelper::log_provider_init(
                    key,
                    &provider.display_name,
                    provider.client_id().is_ok(),
                );
            }
        }
    }
}

fn provider(
    name: &str,
    display_name: &str,
    authorization_endpoint: &str,
    scopes: &[&str],
    scope_delimiter: ScopeDelimiter,
    requires_user_binding: bool,
    extra_params: &[(&str, &str)],
) -> ProviderSettings {
    ProviderSettings {
        name: name.to_string(),
        display_name: Some(display_name.to_string()),
        authorization_endpoint: authorization_endpoint.to_string(),
        scopes: scopes.iter().map(ToString::to_string).collect(),
        scope_delimiter,
        requires_user_binding,
        extra_auth_params: extra_params
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
        ..Default::default()
    }
}

/// Built-in integration providers
#[must_use]
pub fn builtin_providers() -> Vec<ProviderSettings> {
    use ScopeDelimiter::{Comma, Space};

    vec![
        provider(
            "github",
            "GitHub",
            "https://github.com/login/oauth/authorize",
            &["repo", "read:user", "read:org", "notifications"],
            Space,
            true,
            &[],
        ),
        provider(
            "gitlab",
            "GitLab",
            "https://gitlab.com/oauth/authorize",
            &["read_user", "read_api"],
            Space,
            true,
            &[("response_type", "code")],
        ),
        provider(
            "bitbucket",
            "Bitbucket",
            "https://bitbucket.org/site/oauth2/authorize",
            &["repository", "account"],
            Space,
            false,
            &[("response_type", "code")],
        ),
        provider(
            "linear",
            "Linear",
            "https://linear.app/oauth/authorize",
            &["read", "write"],
            Comma,
            true,
            &[("response_type", "code")],
        ),
        provider(
            "jira",
            "Jira",
            "https://auth.atlassian.com/authorize",
            &["read:jira-work", "read:jira-user", "offline_access"],
            Space,
            true,
            &[
                ("audience", "api.atlassian.com"),
                ("prompt", "consent"),
                ("response_type", "code"),
            ],
        ),
        provider(
            "asana",
            "Asana",
            "https://app.asana.com/-/oauth_authorize",
            &["default"],
            Space,
            false,
            &[("response_type", "code")],
        ),
        provider(
            "notion",
            "Notion",
            "https://api.notion.com/v1/oauth/authorize",
            &[],
            Space,
            true,
            &[("owner", "user"), ("response_type", "code")],
        ),
        provider(
            "hubspot",
            "HubSpot",
            "https://app.hubspot.com/oauth/authorize",
            &["crm.objects.contacts.read", "crm.objects.deals.read"],
            Space,
            true,
            &[],
        ),
        provider(
            "salesforce",
            "Salesforce",
            "https://login.salesforce.com/services/oauth2/authorize",
            &["api", "refresh_token"],
            Space,
            false,
            &[("response_type", "code")],
        ),
        provider(
            "quickbooks",
            "QuickBooks",
            "https://appcenter.intuit.com/connect/oauth2",
            &["com.intuit.quickbooks.accounting"],
            Space,
            true,
            &[("response_type", "code")],
        ),
        provider(
            "xero",
            "Xero",
            "https://login.xero.com/identity/connect/authorize",
            &[
                "offline_access",
                "accounting.transactions",
                "accounting.contacts",
            ],
            Space,
            true,
            &[("response_type", "code")],
        ),
    ]
}
