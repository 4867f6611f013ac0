use actix_web::{web, HttpRequest, HttpResponse};

use crate::broker::AuthorizationInitiator;
use crate::guard::SessionGuard;
use crate::utils::responses::ResponseBuilder;

/// `GET /api/integrations/{provider}/connect`
///
/// Always answers with a 302; every failure is folded into the redirect target.
pub async fn connect_integration(
    req: HttpRequest,
    path: web::Path<String>,
    initiator: web::Data<AuthorizationInitiator>,
    guard: web::Data<SessionGuard>,
) -> HttpResponse {
    let provider_key = path.into_inner();
    let credential = guard.credential_from(&req);
    let location = initiator
        .initiate(&provider_key, credential.as_deref())
        .await;
    ResponseBuilder::redirect(&location)
}
