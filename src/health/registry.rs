//! Probe registry and aggregated reports.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;

use super::{HealthProbe, HealthStatus};
use crate::resilience::bounded;

/// Outcome of running every registered probe once.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub checks: BTreeMap<String, HealthStatus>,
}

/// The set of probes exposed to the operations endpoint and the monitor.
pub struct HealthRegistry {
    probes: Vec<Arc<dyn HealthProbe>>,
    timeout: Duration,
}

impl HealthRegistry {
    /// `timeout` bounds each probe on top of whatever deadline it applies itself.
    pub fn new(timeout: Duration) -> Self {
        Self {
            probes: Vec::new(),
            timeout,
        }
    }

    pub fn register(&mut self, probe: Arc<dyn HealthProbe>) {
        self.probes.push(probe);
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Run all probes concurrently.
    pub async fn run_all(&self) -> HealthReport {
        let results = join_all(self.probes.iter().map(|probe| async move {
            let status = match bounded(self.timeout, probe.check()).await {
                Ok(status) => status,
                Err(elapsed) => HealthStatus::unhealthy(format!("probe {}", elapsed)),
            };
            (probe.name().to_string(), status)
        }))
        .await;

        let healthy = results.iter().all(|(_, status)| status.healthy);
        HealthReport {
            healthy,
            checks: results.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::StaticProbe;
    use async_trait::async_trait;

    struct Stuck;

    #[async_trait]
    impl HealthProbe for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn check(&self) -> HealthStatus {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_all_healthy() {
        let mut registry = HealthRegistry::new(Duration::from_secs(1));
        registry.register(Arc::new(StaticProbe::new("a", "ok")));
        registry.register(Arc::new(StaticProbe::new("b", "ok")));
        let report = registry.run_all().await;
        assert!(report.healthy);
        assert_eq!(report.checks.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        assert!(HealthRegistry::new(Duration::from_secs(1)).run_all().await.healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_probe_is_bounded() {
        let mut registry = HealthRegistry::new(Duration::from_secs(5));
        registry.register(Arc::new(StaticProbe::new("ping", "ok")));
        registry.register(Arc::new(Stuck));
        let report = registry.run_all().await;
        assert!(!report.healthy);
        assert!(report.checks["ping"].healthy);
        assert!(!report.checks["stuck"].healthy);
    }
}
