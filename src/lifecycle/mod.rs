//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → assemble (leaves first) → supervisor.start_all
//!     → metrics, health monitor → bind listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → drain listeners
//!     → supervisor.stop_all (reverse order)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Components start before any listener accepts traffic
//! - A component that fails to start rolls back the ones before it
//! - Shutdown has a deadline; a stuck component does not block exit

pub mod managed;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use managed::{ComponentError, ComponentState, ManagedComponent};
pub use shutdown::Shutdown;
pub use startup::{assemble, assemble_with, run, Gateway, RunningGateway, StartupError};
pub use supervisor::{StartFailure, StopFailure, Supervisor};
