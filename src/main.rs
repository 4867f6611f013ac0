#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_web::{middleware::from_fn, middleware::Logger, web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;

use linkrs::{
    broker::AuthorizationInitiator,
    guard::{session_guard_middleware, SessionGuard},
    handlers::{connect_integration, health},
    identity::{shared_verifier, IdentityStore, IdentitySync, MemoryIdentityStore},
    registry::ProviderRegistry,
    settings::LinkrsSettings,
    state::{reap_periodically, store::DEFAULT_STATE_TTL_MINUTES, MemoryStateStore, StateStore},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = LinkrsSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    let verifier = shared_verifier(&settings.session).map_err(|e| {
        std::io::Error::other(format!("Failed to initialize session verifier: {e}"))
    })?;

    let ttl_minutes = i64::try_from(settings.state.ttl_minutes).unwrap_or(DEFAULT_STATE_TTL_MINUTES);
    let states: Arc<dyn StateStore> = Arc::new(
        MemoryStateStore::new(chrono::Duration::minutes(ttl_minutes))
            .with_max_issue_attempts(settings.state.max_issue_attempts),
    );
    let users: Arc<dyn IdentityStore> = Arc::new(MemoryIdentityStore::new());

    let guard = Arc::new(SessionGuard::new(&settings, verifier.clone()));
    let initiator = AuthorizationInitiator::new(
        &settings,
        guard.clone(),
        IdentitySync::new(verifier, users),
        Arc::new(ProviderRegistry::from_settings(&settings)),
        states.clone(),
    );

    actix_web::rt::spawn(reap_periodically(
        states,
        Duration::from_secs(settings.state.reap_interval_seconds),
    ));

    start_server(settings, guard, initiator).await
}

/// Start the HTTP server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(
    settings: LinkrsSettings,
    guard: Arc<SessionGuard>,
    initiator: AuthorizationInitiator,
) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    let guard = web::Data::from(guard);
    let initiator = web::Data::new(initiator);

    HttpServer::new(move || {
        App::new()
            .app_data(guard.clone())
            .app_data(initiator.clone())
            .wrap(from_fn(session_guard_middleware))
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/api/integrations/{provider}/connect",
        web::get().to(connect_integration),
    )
    .route("/ping", web::get().to(health));
}

fn print_startup_info(bind_address: &str, settings: &LinkrsSettings) {
    println!("🚀 Starting linkrs v{} on {bind_address}", linkrs::VERSION);
    println!("🌐 Public URL: {}", settings.application.app_base_url);
    println!(
        "🔐 Session cookie: {} | state TTL: {} min",
        settings.session.cookie_name, settings.state.ttl_minutes
    );
}
