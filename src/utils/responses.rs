use actix_web::HttpResponse;

pub struct ResponseBuilder;

/// Append `error=<code>` to a location, respecting an existing query string
#[must_use]
pub fn with_error_param(location: &str, error_code: &str) -> String {
    let separator = if location.contains('?') { '&' } else { '?' };
    format!(
        "{location}{separator}error={}",
        urlencoding::encode(error_code)
    )
}

impl ResponseBuilder {
    /// Create a 302 redirect response
    #[must_use]
    pub fn redirect(location: &str) -> HttpResponse {
        HttpResponse::Found()
            .append_header(("Location", location))
            .finish()
    }
}
