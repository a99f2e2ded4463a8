//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! External caller (GET /admin/healthcheck):
//!     → registry.rs runs every probe, each under a deadline
//!     → HealthReport (fresh every call, never cached)
//!
//! Background monitor (active.rs):
//!     Periodic timer
//!     → registry.rs
//!     → log transitions, export gauges
//!
//! Probes (probes.rs):
//!     StaticProbe     always healthy
//!     DirectoryProbe  connect + service/anonymous bind
//! ```
//!
//! # Design Decisions
//! - Probes are read-only; they share nothing mutable with request handling
//! - A probe that exceeds its deadline is unhealthy, not pending

pub mod active;
pub mod probes;
pub mod registry;

use async_trait::async_trait;
use serde::Serialize;

pub use active::HealthMonitor;
pub use probes::{DirectoryProbe, StaticProbe};
pub use registry::{HealthRegistry, HealthReport};

/// Result of one probe invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
}

impl HealthStatus {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: message.into(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
        }
    }
}

/// A diagnostic check with no side effects on service state.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> HealthStatus;
}
