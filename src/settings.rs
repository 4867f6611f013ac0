use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

use crate::registry::ScopeDelimiter;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LinkrsSettings {
    pub application: ApplicationSettings,
    pub session: SessionSettings,
    pub state: StateSettings,
    pub guard: GuardSettings,
    pub logging: LoggingSettings,
    /// Integration providers. An empty list selects the built-in provider table.
    pub providers: Vec<ProviderSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Public base URL of the app, used to build provider redirect URIs and
    /// the absolute sign-in / integrations redirects.
    pub app_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// HS256 secret shared with the identity provider that mints session tokens
    pub signing_secret: String,
    /// Expected `iss` claim. Not checked when unset.
    pub issuer: Option<String>,
    /// Clock skew tolerance applied to `exp`
    pub leeway_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    pub ttl_minutes: u64,
    /// Reaper interval. If 0, expired states are never purged.
    pub reap_interval_seconds: u64,
    pub max_issue_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSettings {
    pub protected_prefixes: Vec<String>,
    /// Checked before `protected_prefixes`; a match always passes through.
    pub public_prefixes: Vec<String>,
    pub sign_in_path: String,
    pub integrations_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub name: String,
    pub display_name: Option<String>,
    pub authorization_endpoint: String,
    pub scopes: Vec<String>,
    pub scope_delimiter: ScopeDelimiter,
    pub scope_param: String,
    pub requires_user_binding: bool,
    /// Literal query parameters always sent to the authorize endpoint
    pub extra_auth_params: BTreeMap<String, String>,
    /// Overrides the default `/api/integrations/{name}/callback`
    pub redirect_path: Option<String>,

    // Direct value (can be overridden by environment variable)
    pub client_id: Option<String>,

    // Environment variable name for override, defaults to `{NAME}_CLIENT_ID`
    pub client_id_env: Option<String>,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            app_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "__session".to_string(),
            signing_secret: String::new(),
            issuer: None,
            leeway_seconds: 30,
        }
    }
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            ttl_minutes: 10,
            reap_interval_seconds: 300,
            max_issue_attempts: 5,
        }
    }
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            protected_prefixes: vec![
                "/dashboard".to_string(),
                "/integrations".to_string(),
                "/settings".to_string(),
            ],
            public_prefixes: vec![
                "/api/integrations".to_string(),
                "/sign-in".to_string(),
                "/sign-up".to_string(),
                "/ping".to_string(),
            ],
            sign_in_path: "/sign-in".to_string(),
            integrations_path: "/integrations".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            display_name: None,
            authorization_endpoint: String::new(),
            scopes: Vec::new(),
            scope_delimiter: ScopeDelimiter::Space,
            scope_param: "scope".to_string(),
            requires_user_binding: true,
            extra_auth_params: BTreeMap::new(),
            redirect_path: None,
            client_id: None,
            client_id_env: None,
        }
    }
}

impl LoggingSettings {
    /// Install `env_logger` filtered by `level` (`RUST_LOG` syntax)
    ///
    /// # Errors
    ///
    /// Returns an error if a logger is already installed
    pub fn init_logger(&self) -> anyhow::Result<()> {
        env_logger::Builder::new()
            .parse_filters(&self.level)
            .try_init()?;
        Ok(())
    }
}

impl LinkrsSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - Settings file cannot be read or parsed
    pub fn load() -> anyhow::Result<Self> {
        Self::load_env_file();

        let (mut settings, notes) = Self::load_layers()?;
        Self::apply_env_overrides(&mut settings);

        settings.logging.init_logger()?;
        for note in &notes {
            log::info!("{note}");
        }

        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `LINKRS_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but cannot be read or parsed
    pub fn load_base_settings() -> anyhow::Result<Self> {
        Ok(Self::load_layers()?.0)
    }

    /// File layers plus a note per source, logged once the logger is up
    fn load_layers() -> anyhow::Result<(Self, Vec<String>)> {
        let mut settings = Self::default();
        let mut notes = Vec::new();

        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_file(&default_config_path)?;
            notes.push(format!(
                "Loaded base settings from {}",
                default_config_path.display()
            ));
        }

        if let Ok(secrets_dir) = std::env::var("LINKRS_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_file(&secrets_path)?;
                notes.push(format!("Overriding settings from {}", secrets_path.display()));
            } else {
                notes.push(format!(
                    "LINKRS_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                ));
            }
        }

        Ok((settings, notes))
    }

    /// Parse a single TOML settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for these settings
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let toml_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        basic_toml::from_str(&toml_content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_state_env_overrides(&mut settings.state);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        if let Ok(app_base_url) = std::env::var("APP_BASE_URL") {
            app_settings.app_base_url = app_base_url;
        }
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        if let Ok(cookie_name) = std::env::var("SESSION_COOKIE_NAME") {
            if !cookie_name.is_empty() {
                session_settings.cookie_name = cookie_name;
            }
        }
        if let Ok(secret) = std::env::var("SESSION_SIGNING_SECRET") {
            if !secret.is_empty() {
                session_settings.signing_secret = secret;
            }
        }
    }

    /// Apply environment overrides for state token settings
    pub fn apply_state_env_overrides(state_settings: &mut StateSettings) {
        Self::apply_numeric_env_override("STATE_TTL_MINUTES", &mut state_settings.ttl_minutes);
        Self::apply_numeric_env_override(
            "STATE_REAP_INTERVAL_SECONDS",
            &mut state_settings.reap_interval_seconds,
        );
    }

    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Absolute URL for a path on this app, without a trailing slash on the base
    #[must_use]
    pub fn app_url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.application.app_base_url.trim_end_matches('/'),
            path
        )
    }

}

impl ProviderSettings {
    /// Get the client ID, checking environment variable first, then falling back to direct value.
    /// Read on every call so deployments can leave providers unconfigured.
    #[must_use]
    pub fn get_client_id(&self) -> Option<String> {
        if let Ok(value) = std::env::var(self.client_id_env_name()) {
            return Some(value);
        }
        self.client_id.clone()
    }

    /// Name of the environment variable carrying this provider's client id
    #[must_use]
    pub fn client_id_env_name(&self) -> String {
        self.client_id_env.clone().unwrap_or_else(|| {
            format!("{}_CLIENT_ID", self.name.to_uppercase().replace('-', "_"))
        })
    }

    /// Path of the provider callback on this app
    #[must_use]
    pub fn callback_path(&self) -> String {
        self.redirect_path
            .clone()
            .unwrap_or_else(|| format!("/api/integrations/{}/callback", self.name))
    }
}
