//! Rejection responses produced by the gateway.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Seconds a client should wait before retrying after a backend outage.
const RETRY_AFTER_SECS: &str = "5";

/// 401 with a basic-scheme challenge naming `realm`.
pub fn challenge(realm: &str) -> Response {
    // Realms are validated as header-safe at startup; fall back to a bare
    // scheme rather than failing the response.
    let value = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"));

    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, value)],
        "Credentials are required to access this resource.",
    )
        .into_response()
}

/// 503 telling the client the authentication backend, not its credentials,
/// is the problem.
pub fn backend_unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS))],
        "Authentication backend unavailable.",
    )
        .into_response()
}
