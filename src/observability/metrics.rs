//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_auth_outcomes_total` (counter): authentication results by outcome
//! - `gateway_auth_cache_lookups_total` (counter): cache hits and misses
//! - `gateway_auth_cache_evictions_total` (counter): size-bound evictions
//! - `gateway_auth_cache_entries` (gauge): current cache size
//! - `gateway_health_probe` (gauge): 1=healthy, 0=unhealthy, per probe
//! - `gateway_component_running` (gauge): 1=running, 0=stopped, per component

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Outcome labels: "granted", "denied", "malformed", "missing", "backend_unavailable".
pub fn record_auth_outcome(outcome: &'static str) {
    counter!("gateway_auth_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("gateway_auth_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_eviction() {
    counter!("gateway_auth_cache_evictions_total").increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("gateway_auth_cache_entries").set(entries as f64);
}

pub fn record_probe(probe: &str, healthy: bool) {
    gauge!("gateway_health_probe", "probe" => probe.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_component_state(component: &str, running: bool) {
    gauge!("gateway_component_running", "component" => component.to_string())
        .set(if running { 1.0 } else { 0.0 });
}
