//! Authentication gate in front of every protected route.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{extract_basic, AuthError, Authenticator, ExtractError, Principal};
use crate::http::response::{backend_unavailable, challenge};
use crate::observability::metrics;

/// Why a request was not forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// 401 with a `WWW-Authenticate` challenge for `realm`.
    Challenge { realm: Arc<str> },
    /// 503: the authenticator could not reach its backend.
    Unavailable,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Rejection::Challenge { realm } => challenge(&realm),
            Rejection::Unavailable => backend_unavailable(),
        }
    }
}

/// Extracts credentials and runs the configured authenticator chain.
pub struct AuthGate {
    realm: Arc<str>,
    authenticator: Arc<dyn Authenticator>,
}

impl AuthGate {
    pub fn new(realm: impl Into<Arc<str>>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            realm: realm.into(),
            authenticator,
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    fn challenge(&self) -> Rejection {
        Rejection::Challenge {
            realm: self.realm.clone(),
        }
    }

    /// Decide whether a request with these headers may pass.
    pub async fn admit(&self, headers: &HeaderMap) -> Result<Principal, Rejection> {
        let credentials = match extract_basic(headers) {
            Ok(credentials) => credentials,
            Err(ExtractError::Missing) => {
                tracing::debug!("No credentials supplied, sending challenge");
                metrics::record_auth_outcome("missing");
                return Err(self.challenge());
            }
            Err(err @ ExtractError::Malformed(_)) => {
                tracing::info!(error = %err, "Unusable credentials, sending challenge");
                metrics::record_auth_outcome("malformed");
                return Err(self.challenge());
            }
        };

        // Verification runs on its own task; a panic there surfaces as a JoinError.
        let authenticator = self.authenticator.clone();
        let task_credentials = credentials.clone();
        let outcome = tokio::spawn(async move { authenticator.verify(&task_credentials).await })
            .await
            .unwrap_or_else(|e| {
                Err(AuthError::BackendUnavailable(format!(
                    "verification task failed: {}",
                    e
                )))
            });

        match outcome {
            Ok(principal) => {
                tracing::debug!(principal = %principal, "Authenticated");
                metrics::record_auth_outcome("granted");
                Ok(principal)
            }
            Err(AuthError::Denied) => {
                tracing::warn!(
                    username = %credentials.username(),
                    authenticator = self.authenticator.name(),
                    "Authentication denied"
                );
                metrics::record_auth_outcome("denied");
                Err(self.challenge())
            }
            Err(err @ AuthError::BackendUnavailable(_)) => {
                tracing::error!(
                    username = %credentials.username(),
                    authenticator = self.authenticator.name(),
                    error = %err,
                    "Authentication backend unavailable"
                );
                metrics::record_auth_outcome(err.kind());
                Err(Rejection::Unavailable)
            }
        }
    }
}

/// Middleware: forward with the `Principal` in request extensions, or reject.
pub async fn require_principal(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match gate.admit(request.headers()).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    }
}
