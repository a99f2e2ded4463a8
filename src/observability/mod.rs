//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never secrets: usernames are logged, passwords never
//! - Denials are warnings (audit), backend outages are errors (alerting)
//! - Request ID flows through all spans
//! - Metrics are cheap (no-ops when no recorder is installed)

pub mod logging;
pub mod metrics;
