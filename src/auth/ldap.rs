//! LDAP implementation of the directory connector.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};

use super::directory::{BindOutcome, DirectoryConnector, DirectoryError, DirectorySession};

/// LDAP result code for a rejected simple bind.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Connects to an LDAP server (`ldap://` or `ldaps://`).
#[derive(Debug, Clone)]
pub struct LdapConnector {
    url: String,
    timeout: Duration,
    starttls: bool,
}

impl LdapConnector {
    pub fn new(url: impl Into<String>, timeout: Duration, starttls: bool) -> Self {
        Self {
            url: url.into(),
            timeout,
            starttls,
        }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_starttls(self.starttls);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))?;

        // The connection future multiplexes every operation; it ends once the
        // last `Ldap` handle is dropped.
        let endpoint = self.url.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::debug!(endpoint = %endpoint, error = %e, "LDAP connection closed with error");
            }
        });

        Ok(Box::new(LdapSession {
            ldap,
            timeout: self.timeout,
        }))
    }
}

struct LdapSession {
    ldap: Ldap,
    timeout: Duration,
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<BindOutcome, DirectoryError> {
        let result = self
            .ldap
            .with_timeout(self.timeout)
            .simple_bind(dn, password)
            .await
            .map_err(classify)?;

        match result.rc {
            0 => Ok(BindOutcome::Bound),
            RC_INVALID_CREDENTIALS => Ok(BindOutcome::InvalidCredentials),
            rc => Err(DirectoryError::Protocol(format!(
                "bind returned result code {}: {}",
                rc, result.text
            ))),
        }
    }

    async fn search_dn(&mut self, base: &str, filter: &str) -> Result<Option<String>, DirectoryError> {
        // "1.1" requests no attributes; only the DN is needed.
        let (entries, _) = self
            .ldap
            .with_timeout(self.timeout)
            .search(base, Scope::Subtree, filter, vec!["1.1"])
            .await
            .map_err(classify)?
            .success()
            .map_err(classify)?;

        Ok(entries
            .into_iter()
            .next()
            .map(|entry| SearchEntry::construct(entry).dn))
    }

    async fn unbind(&mut self) {
        let _ = self.ldap.unbind().await;
    }
}

fn classify(err: LdapError) -> DirectoryError {
    match err {
        LdapError::LdapResult { result } => {
            DirectoryError::Protocol(format!("result code {}: {}", result.rc, result.text))
        }
        other => DirectoryError::Unreachable(other.to_string()),
    }
}
