//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization header
//!     → credentials.rs (parse basic scheme)
//!     → Authenticator::verify
//!         cache.rs     (CachingAuthenticator, TTL + bounded store)
//!         → directory.rs (DirectoryAuthenticator, bind strategies)
//!             → ldap.rs   (LDAP connector, network I/O)
//!         or static_users.rs (fixed allow-list)
//!     → Principal | AuthError::Denied | AuthError::BackendUnavailable
//! ```
//!
//! # Design Decisions
//! - Denial is an ordinary outcome, not an exceptional one
//! - Backend failure is a separate variant so callers can never mistake an
//!   outage for a wrong password
//! - Decorators own what they wrap; composition is explicit at assembly

pub mod cache;
pub mod credentials;
pub mod directory;
pub mod ldap;
pub mod static_users;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

pub use cache::{CachePolicy, CacheStats, CachingAuthenticator};
pub use credentials::{extract_basic, ExtractError};
pub use directory::{
    BindOutcome, BindStrategy, DirectoryAuthenticator, DirectoryConnector, DirectoryError,
    DirectorySession,
};
pub use ldap::LdapConnector;
pub use static_users::StaticAuthenticator;

/// A username/password pair taken from a single request.
///
/// Lives only for the duration of one authentication attempt (or as a cache
/// key). `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The authenticated identity attached to a forwarded request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Principal {
    name: String,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Why a verification did not produce a principal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The backend answered and rejected the credentials.
    #[error("credentials rejected")]
    Denied,
    /// The backend could not be asked (unreachable, timed out, misbehaving).
    #[error("authentication backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl AuthError {
    /// Label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Denied => "denied",
            AuthError::BackendUnavailable(_) => "backend_unavailable",
        }
    }
}

/// Verifies credentials against some source of truth.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Short identifier for logs ("static", "directory", "cached").
    fn name(&self) -> &'static str;

    async fn verify(&self, credentials: &Credentials) -> Result<Principal, AuthError>;
}

#[async_trait]
impl<T> Authenticator for Box<T>
where
    T: Authenticator + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn verify(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        (**self).verify(credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_auth_error_kinds() {
        assert_eq!(AuthError::Denied.kind(), "denied");
        assert_eq!(
            AuthError::BackendUnavailable("down".into()).kind(),
            "backend_unavailable"
        );
    }
}
