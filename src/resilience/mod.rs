//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the directory / probe / component:
//!     → timeouts.rs (enforce deadline, cancel on expiry)
//!     → Elapsed is reported as an infrastructure failure by the caller
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Timeout errors are distinct from rejections

pub mod timeouts;

pub use timeouts::{bounded, Elapsed};
