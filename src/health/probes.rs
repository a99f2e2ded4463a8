//! Concrete health probes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{HealthProbe, HealthStatus};
use crate::auth::directory::{BindOutcome, DirectoryConnector, ServiceAccount};
use crate::resilience::bounded;

/// Always healthy. Useful as a liveness signal.
pub struct StaticProbe {
    name: String,
    message: String,
}

impl StaticProbe {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl HealthProbe for StaticProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> HealthStatus {
        HealthStatus::healthy(self.message.clone())
    }
}

/// Checks that the directory accepts a connection and a bind.
///
/// Binds as the service account when one is configured, anonymously
/// otherwise, so the result never depends on end-user traffic.
pub struct DirectoryProbe {
    connector: Arc<dyn DirectoryConnector>,
    account: Option<ServiceAccount>,
    timeout: Duration,
}

impl DirectoryProbe {
    pub fn new(
        connector: Arc<dyn DirectoryConnector>,
        account: Option<ServiceAccount>,
        timeout: Duration,
    ) -> Self {
        Self {
            connector,
            account,
            timeout,
        }
    }

    async fn probe(&self) -> HealthStatus {
        let mut session = match self.connector.connect().await {
            Ok(session) => session,
            Err(e) => return HealthStatus::unhealthy(e.to_string()),
        };

        let (dn, password) = match &self.account {
            Some(account) => (account.dn.as_str(), account.password.as_str()),
            None => ("", ""),
        };
        let outcome = session.bind(dn, password).await;
        session.unbind().await;

        match outcome {
            Ok(BindOutcome::Bound) => {
                HealthStatus::healthy(format!("bind to {} succeeded", self.connector.endpoint()))
            }
            Ok(BindOutcome::InvalidCredentials) => HealthStatus::unhealthy(format!(
                "{} bind to {} rejected",
                if self.account.is_some() { "service account" } else { "anonymous" },
                self.connector.endpoint()
            )),
            Err(e) => HealthStatus::unhealthy(e.to_string()),
        }
    }
}

#[async_trait]
impl HealthProbe for DirectoryProbe {
    fn name(&self) -> &str {
        "directory"
    }

    async fn check(&self) -> HealthStatus {
        match bounded(self.timeout, self.probe()).await {
            Ok(status) => status,
            Err(elapsed) => HealthStatus::unhealthy(format!(
                "{} did not answer: {}",
                self.connector.endpoint(),
                elapsed
            )),
        }
    }
}
