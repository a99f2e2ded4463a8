//! Directory-backed authentication.
//!
//! The authenticator knows the bind strategies; the connector knows the wire
//! protocol. Every attempt is bounded by a single deadline that covers
//! connect, optional service bind, search and user bind.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{AuthError, Authenticator, Credentials, Principal};
use crate::config::BindConfig;
use crate::resilience::bounded;

/// Placeholder substituted with the (escaped) username in DN templates and
/// search filters.
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Infrastructure failure talking to the directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unreachable: {0}")]
    Unreachable(String),
    #[error("directory protocol error: {0}")]
    Protocol(String),
}

/// Result of a simple bind that reached the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Bound,
    InvalidCredentials,
}

/// Opens sessions against a directory server.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Human readable endpoint, for logs and probe messages.
    fn endpoint(&self) -> &str;

    async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// One open connection to the directory.
#[async_trait]
pub trait DirectorySession: Send {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<BindOutcome, DirectoryError>;

    /// Find the DN of the first entry matching `filter` below `base`.
    async fn search_dn(&mut self, base: &str, filter: &str) -> Result<Option<String>, DirectoryError>;

    /// Best-effort close; errors are ignored.
    async fn unbind(&mut self);
}

/// Account the gateway itself binds as before searching for users.
#[derive(Clone)]
pub struct ServiceAccount {
    pub dn: String,
    pub password: String,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("dn", &self.dn)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How a username is turned into a successful bind.
#[derive(Debug, Clone)]
pub enum BindStrategy {
    /// Bind directly as `dn_template` with the placeholder replaced.
    Direct { dn_template: String },
    /// Optionally bind as a service account, search for the user's DN, then
    /// bind as that DN.
    Search {
        base: String,
        filter: String,
        service: Option<ServiceAccount>,
    },
}

impl BindStrategy {
    pub fn from_config(config: &BindConfig) -> Self {
        match config {
            BindConfig::Direct { dn_template } => BindStrategy::Direct {
                dn_template: dn_template.clone(),
            },
            BindConfig::Search {
                base,
                filter,
                service_dn,
                service_password,
            } => BindStrategy::Search {
                base: base.clone(),
                filter: filter.clone(),
                service: service_dn.as_ref().map(|dn| ServiceAccount {
                    dn: dn.clone(),
                    password: service_password.clone().unwrap_or_default(),
                }),
            },
        }
    }

    /// The account a health probe should bind as, if any.
    pub fn service_account(&self) -> Option<&ServiceAccount> {
        match self {
            BindStrategy::Direct { .. } => None,
            BindStrategy::Search { service, .. } => service.as_ref(),
        }
    }
}

/// Verifies credentials by binding against a directory server.
pub struct DirectoryAuthenticator {
    connector: Arc<dyn DirectoryConnector>,
    strategy: BindStrategy,
    timeout: Duration,
}

impl DirectoryAuthenticator {
    pub fn new(connector: Arc<dyn DirectoryConnector>, strategy: BindStrategy, timeout: Duration) -> Self {
        Self {
            connector,
            strategy,
            timeout,
        }
    }

    async fn attempt(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        let mut session = self.connector.connect().await.map_err(unavailable)?;
        let result = self.bind_user(session.as_mut(), credentials).await;
        session.unbind().await;
        result
    }

    async fn bind_user(
        &self,
        session: &mut dyn DirectorySession,
        credentials: &Credentials,
    ) -> Result<Principal, AuthError> {
        let user_dn = match &self.strategy {
            BindStrategy::Direct { dn_template } => {
                dn_template.replace(USERNAME_PLACEHOLDER, &ldap3::dn_escape(credentials.username()))
            }
            BindStrategy::Search {
                base,
                filter,
                service,
            } => {
                if let Some(account) = service {
                    let outcome = session
                        .bind(&account.dn, &account.password)
                        .await
                        .map_err(unavailable)?;
                    if outcome == BindOutcome::InvalidCredentials {
                        // Our own account being refused is an outage, not a user denial.
                        return Err(AuthError::BackendUnavailable(
                            "service account bind rejected".to_string(),
                        ));
                    }
                }

                let filter =
                    filter.replace(USERNAME_PLACEHOLDER, &ldap3::ldap_escape(credentials.username()));
                match session.search_dn(base, &filter).await.map_err(unavailable)? {
                    Some(dn) => dn,
                    None => {
                        tracing::debug!(username = %credentials.username(), "No directory entry for user");
                        return Err(AuthError::Denied);
                    }
                }
            }
        };

        match session
            .bind(&user_dn, credentials.password())
            .await
            .map_err(unavailable)?
        {
            BindOutcome::Bound => Ok(Principal::new(credentials.username())),
            BindOutcome::InvalidCredentials => Err(AuthError::Denied),
        }
    }
}

#[async_trait]
impl Authenticator for DirectoryAuthenticator {
    fn name(&self) -> &'static str {
        "directory"
    }

    async fn verify(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        // An empty password would be an unauthenticated bind, which many
        // servers report as success.
        if credentials.password().is_empty() {
            return Err(AuthError::Denied);
        }

        match bounded(self.timeout, self.attempt(credentials)).await {
            Ok(result) => result,
            Err(elapsed) => {
                tracing::debug!(
                    endpoint = %self.connector.endpoint(),
                    username = %credentials.username(),
                    "Directory verification timed out"
                );
                Err(AuthError::BackendUnavailable(elapsed.to_string()))
            }
        }
    }
}

fn unavailable(err: DirectoryError) -> AuthError {
    AuthError::BackendUnavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Mode {
        Up,
        Refused,
        Hang,
    }

    struct FakeDirectory {
        mode: Mode,
        passwords: HashMap<String, String>,
        uids: HashMap<String, String>,
        connects: AtomicUsize,
    }

    impl FakeDirectory {
        fn new(mode: Mode) -> Arc<Self> {
            let mut passwords = HashMap::new();
            passwords.insert("uid=alice,ou=people,dc=example".to_string(), "secret".to_string());
            passwords.insert("cn=gateway,dc=example".to_string(), "svc".to_string());
            let mut uids = HashMap::new();
            uids.insert("(uid=alice)".to_string(), "uid=alice,ou=people,dc=example".to_string());
            Arc::new(Self {
                mode,
                passwords,
                uids,
                connects: AtomicUsize::new(0),
            })
        }
    }

    struct FakeSession {
        passwords: HashMap<String, String>,
        uids: HashMap<String, String>,
    }

    #[async_trait]
    impl DirectoryConnector for FakeDirectory {
        fn endpoint(&self) -> &str {
            "fake://directory"
        }

        async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::Up => Ok(Box::new(FakeSession {
                    passwords: self.passwords.clone(),
                    uids: self.uids.clone(),
                })),
                Mode::Refused => Err(DirectoryError::Unreachable("connection refused".into())),
                Mode::Hang => std::future::pending().await,
            }
        }
    }

    #[async_trait]
    impl DirectorySession for FakeSession {
        async fn bind(&mut self, dn: &str, password: &str) -> Result<BindOutcome, DirectoryError> {
            match self.passwords.get(dn) {
                Some(expected) if expected == password => Ok(BindOutcome::Bound),
                _ => Ok(BindOutcome::InvalidCredentials),
            }
        }

        async fn search_dn(&mut self, _base: &str, filter: &str) -> Result<Option<String>, DirectoryError> {
            Ok(self.uids.get(filter).cloned())
        }

        async fn unbind(&mut self) {}
    }

    fn direct(dir: Arc<FakeDirectory>) -> DirectoryAuthenticator {
        DirectoryAuthenticator::new(
            dir,
            BindStrategy::Direct {
                dn_template: "uid={username},ou=people,dc=example".into(),
            },
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_direct_bind_success_and_denial() {
        let auth = direct(FakeDirectory::new(Mode::Up));
        let principal = auth.verify(&Credentials::new("alice", "secret")).await.unwrap();
        assert_eq!(principal.name(), "alice");
        assert_eq!(
            auth.verify(&Credentials::new("alice", "nope")).await,
            Err(AuthError::Denied)
        );
        assert_eq!(
            auth.verify(&Credentials::new("bob", "secret")).await,
            Err(AuthError::Denied)
        );
    }

    #[tokio::test]
    async fn test_empty_password_never_reaches_directory() {
        let dir = FakeDirectory::new(Mode::Up);
        let auth = direct(dir.clone());
        assert_eq!(
            auth.verify(&Credentials::new("alice", "")).await,
            Err(AuthError::Denied)
        );
        assert_eq!(dir.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        let auth = direct(FakeDirectory::new(Mode::Refused));
        let err = auth
            .verify(&Credentials::new("alice", "secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BackendUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_directory_times_out_as_unavailable() {
        let auth = direct(FakeDirectory::new(Mode::Hang));
        let err = auth
            .verify(&Credentials::new("alice", "secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BackendUnavailable(ref msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_search_then_bind() {
        let strategy = BindStrategy::Search {
            base: "ou=people,dc=example".into(),
            filter: "(uid={username})".into(),
            service: Some(ServiceAccount {
                dn: "cn=gateway,dc=example".into(),
                password: "svc".into(),
            }),
        };
        let auth = DirectoryAuthenticator::new(FakeDirectory::new(Mode::Up), strategy, Duration::from_secs(2));

        assert!(auth.verify(&Credentials::new("alice", "secret")).await.is_ok());
        assert_eq!(
            auth.verify(&Credentials::new("carol", "secret")).await,
            Err(AuthError::Denied)
        );
    }

    #[tokio::test]
    async fn test_rejected_service_account_is_unavailable() {
        let strategy = BindStrategy::Search {
            base: "ou=people,dc=example".into(),
            filter: "(uid={username})".into(),
            service: Some(ServiceAccount {
                dn: "cn=gateway,dc=example".into(),
                password: "rotated".into(),
            }),
        };
        let auth = DirectoryAuthenticator::new(FakeDirectory::new(Mode::Up), strategy, Duration::from_secs(2));
        let err = auth
            .verify(&Credentials::new("alice", "secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_username_is_escaped_in_filter() {
        let strategy = BindStrategy::Search {
            base: "ou=people,dc=example".into(),
            filter: "(uid={username})".into(),
            service: None,
        };
        let auth = DirectoryAuthenticator::new(FakeDirectory::new(Mode::Up), strategy, Duration::from_secs(2));
        // "*" would match every entry if it reached the filter unescaped.
        assert_eq!(
            auth.verify(&Credentials::new("ali*", "secret")).await,
            Err(AuthError::Denied)
        );
    }
}
