//! Timeout enforcement.
//!
//! Every call that leaves the process (directory binds, probes, component
//! teardown) goes through [`bounded`] so a hung peer cannot stall the caller.

use std::future::Future;
use std::time::Duration;

/// The wrapped operation did not finish within its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out after {0:?}")]
pub struct Elapsed(pub Duration);

/// Run `fut` with a deadline. The future is dropped (cancelled) on expiry.
pub async fn bounded<F>(limit: Duration, fut: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Elapsed(limit))
}
