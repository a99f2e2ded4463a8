//! Fixed allow-list authenticator for tests and non-production wiring.

use std::collections::HashMap;

use async_trait::async_trait;
use subtle::ConstantTimeEq;

use super::{AuthError, Authenticator, Credentials, Principal};

/// Accepts exactly the username/password pairs it was built with.
#[derive(Clone, Default)]
pub struct StaticAuthenticator {
    users: HashMap<String, String>,
}

impl StaticAuthenticator {
    pub fn new(users: HashMap<String, String>) -> Self {
        Self { users }
    }

    /// Add or replace a single user.
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(username.into(), password.into());
        self
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn verify(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        match self.users.get(credentials.username()) {
            Some(expected) if ct_eq(expected.as_bytes(), credentials.password().as_bytes()) => {
                Ok(Principal::new(credentials.username()))
            }
            _ => Err(AuthError::Denied),
        }
    }
}

/// Constant-time comparison of two byte slices.
fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> StaticAuthenticator {
        StaticAuthenticator::default().with_user("alice", "secret")
    }

    #[tokio::test]
    async fn test_accepts_listed_user() {
        let principal = authenticator()
            .verify(&Credentials::new("alice", "secret"))
            .await
            .unwrap();
        assert_eq!(principal.name(), "alice");
    }

    #[tokio::test]
    async fn test_rejects_wrong_password_and_unknown_user() {
        let auth = authenticator();
        assert_eq!(
            auth.verify(&Credentials::new("alice", "wrong")).await,
            Err(AuthError::Denied)
        );
        assert_eq!(
            auth.verify(&Credentials::new("mallory", "secret")).await,
            Err(AuthError::Denied)
        );
        assert_eq!(
            auth.verify(&Credentials::new("alice", "secre")).await,
            Err(AuthError::Denied)
        );
    }
}
