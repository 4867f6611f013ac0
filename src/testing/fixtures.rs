//! Pre-built test objects

use chrono::Duration;
use std::sync::Arc;

use super::constants::{
    TEST_APP_BASE_URL, TEST_CLIENT_ID, TEST_EMAIL, TEST_EXTERNAL_USER_ID, TEST_SIGNING_SECRET,
};
use super::mock::CountingStateStore;
use crate::broker::AuthorizationInitiator;
use crate::guard::SessionGuard;
use crate::identity::{HmacTokenVerifier, IdentityStore, IdentitySync, MemoryIdentityStore};
use crate::registry::{builtin_providers, ProviderRegistry};
use crate::settings::{LinkrsSettings, ProviderSettings};
use crate::state::StateStore;

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Settings pointing at the test app URL with a known signing secret
    #[must_use]
    pub fn settings() -> LinkrsSettings {
        let mut settings = LinkrsSettings::default();
        settings.application.app_base_url = TEST_APP_BASE_URL.to_string();
        settings.session.signing_secret = String::from_utf8_lossy(TEST_SIGNING_SECRET).into_owned();
        settings
    }

    #[must_use]
    pub fn verifier() -> HmacTokenVerifier {
        HmacTokenVerifier::new(TEST_SIGNING_SECRET)
    }

    /// Valid session token for the default test user
    ///
    /// # Panics
    ///
    /// Panics if the token cannot be signed
    #[must_use]
    pub fn session_token() -> String {
        Self::session_token_for(TEST_EXTERNAL_USER_ID)
    }

    /// # Panics
    ///
    /// Panics if the token cannot be signed
    #[must_use]
    pub fn session_token_for(external_user_id: &str) -> String {
        Self::verifier()
            .issue(external_user_id, Some(TEST_EMAIL), Duration::hours(1))
            .unwrap()
    }

    /// # Panics
    ///
    /// Panics if the token cannot be signed
    #[must_use]
    pub fn expired_session_token() -> String {
        Self::verifier()
            .issue(TEST_EXTERNAL_USER_ID, Some(TEST_EMAIL), Duration::hours(-1))
            .unwrap()
    }

    /// Built-in provider row whose client id never comes from the real
    /// `<NAME>_CLIENT_ID` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a built-in provider
    #[must_use]
    pub fn provider(name: &str, client_id: Option<&str>) -> ProviderSettings {
        let mut provider = builtin_providers()
            .into_iter()
            .find(|p| p.name == name)
            .unwrap();
        provider.client_id = client_id.map(ToString::to_string);
        provider.client_id_env = Some(format!(
            "LINKRS_FIXTURE_{}_CLIENT_ID",
            name.to_uppercase()
        ));
        provider
    }

    /// Every built-in provider, configured with [`TEST_CLIENT_ID`]
    #[must_use]
    pub fn configured_providers() -> Vec<ProviderSettings> {
        builtin_providers()
            .iter()
            .map(|p| Self::provider(&p.name, Some(TEST_CLIENT_ID)))
            .collect()
    }

    /// Fully wired broker over in-memory stores with every provider configured
    #[must_use]
    pub fn broker() -> TestBroker {
        TestBroker::new(Self::configured_providers())
    }
}

/// Broker plus handles on its stores for assertions
pub struct TestBroker {
    pub settings: LinkrsSettings,
    pub guard: Arc<SessionGuard>,
    pub states: Arc<CountingStateStore>,
    pub users: Arc<MemoryIdentityStore>,
    pub initiator: AuthorizationInitiator,
}

impl TestBroker {
    #[must_use]
    pub fn new(providers: Vec<ProviderSettings>) -> Self {
        let states = Arc::new(CountingStateStore::default());
        let users = Arc::new(MemoryIdentityStore::new());
        Self::with_stores(providers, states, users.clone(), users)
    }

    /// Wire a broker over arbitrary stores. `states` and `users` are the handles
    /// kept for assertions.
    #[must_use]
    pub fn with_stores(
        providers: Vec<ProviderSettings>,
        states: Arc<CountingStateStore>,
        users: Arc<MemoryIdentityStore>,
        identity_store: Arc<dyn IdentityStore>,
    ) -> Self {
        let state_store: Arc<dyn StateStore> = states.clone();
        Self::wire(providers, state_store, states, users, identity_store)
    }

    /// Wire a broker whose initiator uses `state_store` directly
    #[must_use]
    pub fn with_state_store(
        providers: Vec<ProviderSettings>,
        state_store: Arc<dyn StateStore>,
    ) -> Self {
        let users = Arc::new(MemoryIdentityStore::new());
        Self::wire(
            providers,
            state_store,
            Arc::new(CountingStateStore::default()),
            users.clone(),
            users,
        )
    }

    fn wire(
        providers: Vec<ProviderSettings>,
        state_store: Arc<dyn StateStore>,
        states: Arc<CountingStateStore>,
        users: Arc<MemoryIdentityStore>,
        identity_store: Arc<dyn IdentityStore>,
    ) -> Self {
        let settings = TestFixtures::settings();
        let verifier = Arc::new(TestFixtures::verifier());
        let guard = Arc::new(SessionGuard::new(&settings, verifier.clone()));
        let identity = IdentitySync::new(verifier, identity_store);
        let registry = Arc::new(ProviderRegistry::new(providers));
        let initiator =
            AuthorizationInitiator::new(&settings, guard.clone(), identity, registry, state_store);

        Self {
            settings,
            guard,
            states,
            users,
            initiator,
        }
    }
}
