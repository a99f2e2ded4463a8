//! Basic-scheme credential extraction.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::Credentials;

/// Why no credentials could be taken from a request.
///
/// Both variants end in the same challenge response; they are kept apart so
/// protocol noise is not logged as a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("no Authorization header")]
    Missing,
    #[error("malformed Authorization header: {0}")]
    Malformed(&'static str),
}

/// Pull basic credentials out of the request headers.
pub fn extract_basic(headers: &HeaderMap) -> Result<Credentials, ExtractError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(ExtractError::Missing)?;
    let value = value
        .to_str()
        .map_err(|_| ExtractError::Malformed("non-ascii header"))?;
    parse_basic(value)
}

/// Parse an `Authorization` header value of the form `Basic <base64(user:pass)>`.
pub fn parse_basic(value: &str) -> Result<Credentials, ExtractError> {
    let (scheme, encoded) = value
        .trim()
        .split_once(' ')
        .ok_or(ExtractError::Malformed("missing scheme"))?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(ExtractError::Malformed("unsupported scheme"));
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| ExtractError::Malformed("invalid base64"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| ExtractError::Malformed("invalid utf-8"))?;

    // The password may itself contain ':'; only the first one separates.
    let (username, password) = decoded
        .split_once(':')
        .ok_or(ExtractError::Malformed("missing ':' separator"))?;
    if username.is_empty() {
        return Err(ExtractError::Malformed("empty username"));
    }

    Ok(Credentials::new(username, password))
}
