//! Active health checking.
//!
//! # Responsibilities
//! - Periodically run every registered probe
//! - Log healthy/unhealthy transitions and export probe gauges

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use super::HealthRegistry;
use crate::config::HealthCheckConfig;
use crate::observability::metrics;

pub struct HealthMonitor {
    registry: Arc<HealthRegistry>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(registry: Arc<HealthRegistry>, config: HealthCheckConfig) -> Self {
        Self { registry, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            probes = self.registry.len(),
            "Health monitor starting"
        );

        let interval = Duration::from_secs(self.config.interval_secs);
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // Last observed state per probe, used only to detect transitions.
        let mut last: HashMap<String, bool> = HashMap::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all(&mut last).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_all(&self, last: &mut HashMap<String, bool>) {
        let report = self.registry.run_all().await;

        for (name, status) in &report.checks {
            metrics::record_probe(name, status.healthy);

            let previous = last.insert(name.clone(), status.healthy);
            match (previous, status.healthy) {
                (Some(true) | None, false) => {
                    tracing::error!(probe = %name, message = %status.message, "Health probe failing");
                }
                (Some(false), true) => {
                    tracing::info!(probe = %name, message = %status.message, "Health probe recovered");
                }
                _ => {
                    tracing::debug!(probe = %name, healthy = status.healthy, "Health probe checked");
                }
            }
        }
    }
}
