//! Managed component contract.

use std::fmt;

use async_trait::async_trait;

use crate::resilience::Elapsed;

/// Failure reported by a component's `start()` or `stop()`.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Failed(String),
    #[error("{0}")]
    TimedOut(#[from] Elapsed),
}

/// Lifecycle state as tracked by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Stopped,
    Running,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentState::Stopped => f.write_str("stopped"),
            ComponentState::Running => f.write_str("running"),
        }
    }
}

/// A subsystem that owns external resources only between `start()` and `stop()`.
///
/// Implementations must release everything acquired in `start()` when
/// `stop()` returns, and treat `stop()` on a stopped component as a no-op.
#[async_trait]
pub trait ManagedComponent: Send {
    fn name(&self) -> &str;

    async fn start(&mut self) -> Result<(), ComponentError>;

    async fn stop(&mut self) -> Result<(), ComponentError>;
}
