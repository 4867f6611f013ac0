//! Generic authorization initiation, parameterized by the provider table

use log::debug;
use std::sync::Arc;
use url::Url;

use super::BrokerError;
use crate::guard::SessionGuard;
use crate::identity::IdentitySync;
use crate::registry::{ConfigurationError, ProviderRegistry};
use crate::settings::LinkrsSettings;
use crate::state::StateStore;
use crate::utils::logging::LoggingHelper;
use crate::utils::responses::with_error_param;

pub struct AuthorizationInitiator {
    guard: Arc<SessionGuard>,
    identity: IdentitySync,
    registry: Arc<ProviderRegistry>,
    states: Arc<dyn StateStore>,
    app_base_url: String,
    sign_in_url: String,
    integrations_url: String,
}

impl AuthorizationInitiator {
    #[must_use]
    pub fn new(
        settings: &LinkrsSettings,
        guard: Arc<SessionGuard>,
        identity: IdentitySync,
        registry: Arc<ProviderRegistry>,
        states: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            guard,
            identity,
            registry,
            states,
            app_base_url: settings.application.app_base_url.clone(),
            sign_in_url: format!(
                "{}?redirect={}",
                settings.app_url(&settings.guard.sign_in_path),
                settings.guard.integrations_path
            ),
            integrations_url: settings.app_url(&settings.guard.integrations_path),
        }
    }

    /// Resolve where to send the browser for "connect `provider_key`".
    ///
    /// Always yields a location: the provider's authorize URL on success, sign-in
    /// for an unauthenticated caller, or the integrations page with a safe
    /// `error` code for everything else.
    pub async fn initiate(&self, provider_key: &str, credential: Option<&str>) -> String {
        match self.authorization_url(provider_key, credential).await {
            Ok(url) => url,
            Err(BrokerError::Auth(e)) => {
                debug!("Unauthenticated {provider_key} initiation: {e}");
                self.sign_in_url.clone()
            }
            Err(e) => {
                let code = e.error_code(provider_key);
                LoggingHelper::log_initiation_failed(provider_key, &code, &e);
                with_error_param(&self.integrations_url, &code)
            }
        }
    }

    /// Build the provider authorize URL, minting a state token on the way.
    ///
    /// Authentication runs before the registry is consulted. Configuration is
    /// fully validated before the caller's user row is synced or any state is
    /// minted.
    ///
    /// # Errors
    ///
    /// Returns `Auth` for a missing or invalid credential, `Configuration` for an
    /// unknown or unconfigured provider, `Unexpected` for store failures
    pub async fn authorization_url(
        &self,
        provider_key: &str,
        credential: Option<&str>,
    ) -> Result<String, BrokerError> {
        let claims = self.guard.authenticate(credential).await?;

        let provider = self.registry.lookup(provider_key)?;
        let client_id = provider.client_id()?;
        let mut url = Url::parse(&provider.authorization_endpoint).map_err(|e| {
            ConfigurationError::InvalidEndpoint {
                provider: provider.key.clone(),
                reason: e.to_string(),
            }
        })?;

        let user = self.identity.sync_claims(&claims).await?;
        let bound_user_id = provider.requires_user_binding.then_some(user.internal_id);
        let state = self.states.issue(bound_user_id).await?;

        let scopes = provider.joined_scopes();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &client_id)
                .append_pair("redirect_uri", &provider.redirect_uri(&self.app_base_url));
            if let Some(scopes) = &scopes {
                query.append_pair(&provider.scope_param, scopes);
            }
            for (key, value) in &provider.extra_params {
                query.append_pair(key, value);
            }
            query.append_pair("state", &state);
        }

        LoggingHelper::log_initiation_redirect(provider_key, scopes.as_deref());
        Ok(url.into())
    }
}
