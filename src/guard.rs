//! Session guard
//!
//! The single gatekeeping chokepoint: every inbound request passes through
//! [`session_guard_middleware`] before any handler runs. Paths in the protected
//! table require a valid session credential; everything else passes through
//! untouched.

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, HttpMessage, HttpRequest};
use log::{debug, error};
use std::sync::Arc;

use crate::identity::{AuthError, TokenVerifier, VerifiedClaims};
use crate::settings::LinkrsSettings;
use crate::utils::responses::ResponseBuilder;

pub struct SessionGuard {
    protected_prefixes: Vec<String>,
    public_prefixes: Vec<String>,
    cookie_name: String,
    sign_in_path: String,
    verifier: Arc<dyn TokenVerifier>,
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl SessionGuard {
    #[must_use]
    pub fn new(settings: &LinkrsSettings, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            protected_prefixes: settings.guard.protected_prefixes.clone(),
            public_prefixes: settings.guard.public_prefixes.clone(),
            cookie_name: settings.session.cookie_name.clone(),
            sign_in_path: settings.guard.sign_in_path.clone(),
            verifier,
        }
    }

    /// Whether `path` requires an authenticated caller. Public prefixes win.
    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        if self.public_prefixes.iter().any(|p| matches_prefix(path, p)) {
            return false;
        }
        self.protected_prefixes
            .iter()
            .any(|p| matches_prefix(path, p))
    }

    /// Session credential from the session cookie, falling back to a bearer header
    #[must_use]
    pub fn credential_from(&self, req: &HttpRequest) -> Option<String> {
        if let Some(cookie) = req.cookie(&self.cookie_name) {
            if !cookie.value().is_empty() {
                return Some(cookie.value().to_string());
            }
        }

        req.headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(ToString::to_string)
    }

    /// Verify a request credential
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` when none was presented, otherwise whatever the
    /// verifier reports
    pub async fn authenticate(&self, credential: Option<&str>) -> Result<VerifiedClaims, AuthError> {
        match credential {
            Some(credential) => self.verifier.verify(credential).await,
            None => Err(AuthError::MissingCredential),
        }
    }

    #[must_use]
    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }
}

/// Route-level gate wrapping the whole app.
///
/// On protected paths a missing or invalid credential becomes a bare redirect to
/// sign-in; the failure reason is only logged. Verified claims are stored in the
/// request extensions for downstream handlers.
///
/// # Errors
///
/// Returns an internal error if the app was built without a `SessionGuard`
pub async fn session_guard_middleware(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<EitherBody<impl MessageBody>>, actix_web::Error> {
    let Some(guard) = req.app_data::<web::Data<SessionGuard>>().cloned() else {
        error!("SessionGuard missing from app data; refusing request");
        return Err(actix_web::error::ErrorInternalServerError(
            "session guard not configured",
        ));
    };

    if !guard.is_protected(req.path()) {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    }

    let credential = guard.credential_from(req.request());
    match guard.authenticate(credential.as_deref()).await {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.call(req).await.map(ServiceResponse::map_into_left_body)
        }
        Err(e) => {
            debug!("Rejected request to protected path {}: {e}", req.path());
            let response = ResponseBuilder::redirect(guard.sign_in_path());
            Ok(req.into_response(response).map_into_right_body())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::HmacTokenVerifier;
    use actix_web::cookie::Cookie;
    use actix_web::middleware::from_fn;
    use actix_web::test as actix_test;
    use actix_web::{App, HttpResponse};
    use chrono::Duration;

    const SECRET: &[u8] = b"test_key_32_bytes_long_for_test_";

    fn guard() -> SessionGuard {
        SessionGuard::new(
            &LinkrsSettings::default(),
            Arc::new(HmacTokenVerifier::new(SECRET)),
        )
    }

    fn valid_token() -> String {
        HmacTokenVerifier::new(SECRET)
            .issue("user_1", Some("dev@example.com"), Duration::hours(1))
            .unwrap()
    }

    async fn whoami(req: HttpRequest) -> HttpResponse {
        let sub = req
            .extensions()
            .get::<VerifiedClaims>()
            .map(|claims| claims.external_user_id.clone())
            .unwrap_or_default();
        HttpResponse::Ok().body(sub)
    }

    #[test]
    fn test_prefix_table() {
        let guard = guard();
        assert!(guard.is_protected("/dashboard"));
        assert!(guard.is_protected("/integrations/github"));
        assert!(!guard.is_protected("/integrationsfoo"));
        assert!(!guard.is_protected("/api/integrations/github/connect"));
        assert!(!guard.is_protected("/sign-in"));
        assert!(!guard.is_protected("/"));
    }

    #[test]
    fn test_credential_sources() {
        let guard = guard();

        let req = actix_test::TestRequest::default()
            .cookie(Cookie::new("__session", "from-cookie"))
            .insert_header(("Authorization", "Bearer from-header"))
            .to_http_request();
        assert_eq!(guard.credential_from(&req).as_deref(), Some("from-cookie"));

        let req = actix_test::TestRequest::default()
            .insert_header(("Authorization", "Bearer from-header"))
            .to_http_request();
        assert_eq!(guard.credential_from(&req).as_deref(), Some("from-header"));

        let req = actix_test::TestRequest::default()
            .cookie(Cookie::new("__session", ""))
            .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert_eq!(guard.credential_from(&req), None);
    }

    #[actix_web::test]
    async fn test_authenticate_without_credential() {
        assert_eq!(
            guard().authenticate(None).await.unwrap_err(),
            AuthError::MissingCredential
        );
    }

    #[actix_web::test]
    async fn test_middleware_redirects_without_leaking_reason() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(guard()))
                .wrap(from_fn(session_guard_middleware))
                .route("/dashboard", web::get().to(whoami)),
        )
        .await;

        for req in [
            actix_test::TestRequest::get().uri("/dashboard").to_request(),
            actix_test::TestRequest::get()
                .uri("/dashboard")
                .cookie(Cookie::new("__session", "expired.or.malformed"))
                .to_request(),
        ] {
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), 302);
            assert_eq!(
                resp.headers().get("Location").unwrap().to_str().unwrap(),
                "/sign-in"
            );
        }
    }

    #[actix_web::test]
    async fn test_middleware_passes_valid_session_with_claims() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(guard()))
                .wrap(from_fn(session_guard_middleware))
                .route("/dashboard", web::get().to(whoami)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/dashboard")
            .cookie(Cookie::new("__session", valid_token()))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(actix_test::read_body(resp).await, "user_1");
    }

    #[actix_web::test]
    async fn test_middleware_accepts_bearer_header() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(guard()))
                .wrap(from_fn(session_guard_middleware))
                .route("/settings", web::get().to(whoami)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/settings")
            .insert_header(("Authorization", format!("Bearer {}", valid_token())))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(actix_test::read_body(resp).await, "user_1");
    }

    #[actix_web::test]
    async fn test_middleware_passes_public_paths_unmodified() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(guard()))
                .wrap(from_fn(session_guard_middleware))
                .route("/about", web::get().to(whoami)),
        )
        .await;

        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/about").to_request()).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(actix_test::read_body(resp).await, "");
    }
}
