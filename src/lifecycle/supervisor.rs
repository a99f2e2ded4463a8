//! Ordered start/stop of managed components.

use std::time::Duration;

use super::managed::{ComponentError, ComponentState, ManagedComponent};
use crate::observability::metrics;
use crate::resilience::bounded;

/// Deadline for a single component's `stop()` unless configured otherwise.
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// A component failed to start; everything started before it has been stopped.
#[derive(Debug, thiserror::Error)]
#[error("component '{component}' failed to start: {source}")]
pub struct StartFailure {
    pub component: String,
    #[source]
    pub source: ComponentError,
}

/// A component failed to stop. Shutdown continued regardless.
#[derive(Debug, thiserror::Error)]
#[error("component '{component}' failed to stop: {source}")]
pub struct StopFailure {
    pub component: String,
    #[source]
    pub source: ComponentError,
}

struct Supervised {
    component: Box<dyn ManagedComponent>,
    state: ComponentState,
}

/// Starts components in registration order and stops them in reverse.
///
/// Start and stop are sequential and take `&mut self`, so they can never
/// run concurrently with each other.
pub struct Supervisor {
    components: Vec<Supervised>,
    stop_timeout: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each component's `stop()` by `limit`.
    pub fn with_stop_timeout(mut self, limit: Duration) -> Self {
        self.stop_timeout = limit;
        self
    }

    /// Append a component; it starts after every component added before it.
    pub fn manage(&mut self, component: Box<dyn ManagedComponent>) {
        self.components.push(Supervised {
            component,
            state: ComponentState::Stopped,
        });
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Names and states in start order.
    pub fn states(&self) -> Vec<(String, ComponentState)> {
        self.components
            .iter()
            .map(|s| (s.component.name().to_string(), s.state))
            .collect()
    }

    /// Start every stopped component in order.
    ///
    /// On the first failure, the components already running are stopped in
    /// reverse order and the failure is returned; later components are never
    /// started.
    pub async fn start_all(&mut self) -> Result<(), StartFailure> {
        for i in 0..self.components.len() {
            let supervised = &mut self.components[i];
            if supervised.state == ComponentState::Running {
                continue;
            }

            let name = supervised.component.name().to_string();
            tracing::info!(component = %name, "Starting managed component");
            let result = supervised.component.start().await;
            match result {
                Ok(()) => {
                    supervised.state = ComponentState::Running;
                    metrics::record_component_state(&name, true);
                    tracing::info!(component = %name, "Managed component running");
                }
                Err(source) => {
                    tracing::error!(component = %name, error = %source, "Managed component failed to start");
                    for failure in self.stop_all().await {
                        tracing::error!(error = %failure, "Cleanup after failed startup incomplete");
                    }
                    return Err(StartFailure {
                        component: name,
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    /// Stop every running component in reverse start order.
    ///
    /// A failing or hanging `stop()` is logged and collected; the remaining
    /// components are still stopped. Each `stop()` gets its own deadline. A
    /// component whose stop failed is considered stopped and will not be
    /// stopped again.
    pub async fn stop_all(&mut self) -> Vec<StopFailure> {
        let mut failures = Vec::new();

        for supervised in self.components.iter_mut().rev() {
            if supervised.state == ComponentState::Stopped {
                continue;
            }

            let name = supervised.component.name().to_string();
            tracing::info!(component = %name, "Stopping managed component");
            let result = bounded(self.stop_timeout, supervised.component.stop())
                .await
                .unwrap_or_else(|elapsed| Err(ComponentError::TimedOut(elapsed)));
            supervised.state = ComponentState::Stopped;
            metrics::record_component_state(&name, false);

            match result {
                Ok(()) => tracing::info!(component = %name, "Managed component stopped"),
                Err(source) => {
                    tracing::error!(component = %name, error = %source, "Managed component failed to stop");
                    failures.push(StopFailure {
                        component: name,
                        source,
                    });
                }
            }
        }

        failures
    }
}
