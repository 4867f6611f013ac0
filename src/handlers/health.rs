use actix_web::HttpResponse;

/// Liveness check
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("pong")
}
