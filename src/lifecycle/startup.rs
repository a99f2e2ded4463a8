//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from a validated configuration, leaves first
//! - Start managed components before any listener accepts traffic
//! - Start background tasks (health monitor, metrics exporter)
//! - Bind listeners, serve until told to stop, then tear down in reverse
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - A failure after components started stops them before returning
//! - Listeners start last (traffic only when ready)

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join_all, select_all};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{setup_admin_router, AdminState};
use crate::auth::{
    Authenticator, BindStrategy, CachePolicy, CachingAuthenticator, DirectoryAuthenticator,
    DirectoryConnector, LdapConnector, StaticAuthenticator,
};
use crate::config::{validate_config, AuthBackend, ComponentConfig, ConfigError, GatewayConfig};
use crate::health::{DirectoryProbe, HealthMonitor, HealthRegistry, StaticProbe};
use crate::http::{AuthGate, GatewayServer};
use crate::index::IndexEngine;
use crate::lifecycle::managed::ComponentState;
use crate::lifecycle::signals::wait_for_shutdown;
use crate::lifecycle::supervisor::{StartFailure, Supervisor};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::bounded;

/// Error type for gateway startup and serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("directory backend selected but no directory connector is available")]
    NoDirectory,
    #[error(transparent)]
    Component(#[from] StartFailure),
    #[error("metrics exporter failed to start: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("invalid address '{address}' for {field}")]
    Address {
        field: &'static str,
        address: String,
    },
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load TLS material: {0}")]
    Tls(#[source] std::io::Error),
    #[error("listener failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Every subsystem wired together but nothing started yet.
pub struct Gateway {
    config: GatewayConfig,
    gate: Arc<AuthGate>,
    cache: Option<Arc<CachingAuthenticator>>,
    health: Arc<HealthRegistry>,
    supervisor: Supervisor,
}

/// Build the gateway, talking LDAP to the configured directory.
pub fn assemble(config: GatewayConfig) -> Result<Gateway, StartupError> {
    let connector = match (&config.auth.backend, &config.auth.directory) {
        (AuthBackend::Directory, Some(directory)) => Some(Arc::new(LdapConnector::new(
            directory.url.clone(),
            Duration::from_millis(directory.timeout_ms),
            directory.starttls,
        )) as Arc<dyn DirectoryConnector>),
        _ => None,
    };
    assemble_with(config, connector)
}

/// Build the gateway around an explicit directory connector.
///
/// `connector` is only consulted when the directory backend is selected.
pub fn assemble_with(
    config: GatewayConfig,
    connector: Option<Arc<dyn DirectoryConnector>>,
) -> Result<Gateway, StartupError> {
    validate_config(&config).map_err(ConfigError::Validation)?;

    let mut health = HealthRegistry::new(Duration::from_secs(config.health_check.timeout_secs));
    health.register(Arc::new(StaticProbe::new("gateway", "accepting requests")));

    let (authenticator, cache): (Arc<dyn Authenticator>, Option<Arc<CachingAuthenticator>>) =
        match config.auth.backend {
            AuthBackend::Static => (
                Arc::new(StaticAuthenticator::new(config.auth.users.clone())),
                None,
            ),
            AuthBackend::Directory => {
                let directory = config.auth.directory.as_ref().ok_or(StartupError::NoDirectory)?;
                let connector = connector.ok_or(StartupError::NoDirectory)?;
                let timeout = Duration::from_millis(directory.timeout_ms);
                let strategy = BindStrategy::from_config(&directory.bind);

                health.register(Arc::new(DirectoryProbe::new(
                    connector.clone(),
                    strategy.service_account().cloned(),
                    timeout,
                )));

                let backend = DirectoryAuthenticator::new(connector, strategy, timeout);
                if directory.cache.ttl_secs == 0 {
                    (Arc::new(backend), None)
                } else {
                    let cache = Arc::new(CachingAuthenticator::wrap(
                        Box::new(backend),
                        CachePolicy::from_config(&directory.cache),
                    ));
                    (cache.clone() as Arc<dyn Authenticator>, Some(cache))
                }
            }
        };

    tracing::info!(
        backend = ?config.auth.backend,
        authenticator = authenticator.name(),
        cached = cache.is_some(),
        probes = health.len(),
        "Authentication chain assembled"
    );

    let stop_timeout = Duration::from_secs(config.timeouts.shutdown_secs);
    let mut supervisor = Supervisor::new().with_stop_timeout(stop_timeout);
    for component in &config.components {
        match component {
            ComponentConfig::IndexEngine(engine) => {
                supervisor.manage(Box::new(IndexEngine::new(engine.clone())));
            }
        }
    }

    let gate = Arc::new(AuthGate::new(config.auth.realm.as_str(), authenticator));

    Ok(Gateway {
        config,
        gate,
        cache,
        health: Arc::new(health),
        supervisor,
    })
}

impl Gateway {
    pub fn gate(&self) -> Arc<AuthGate> {
        self.gate.clone()
    }

    pub fn cache(&self) -> Option<Arc<CachingAuthenticator>> {
        self.cache.clone()
    }

    pub fn health(&self) -> Arc<HealthRegistry> {
        self.health.clone()
    }

    /// Register an extra component; it starts after the configured ones.
    pub fn manage(&mut self, component: Box<dyn crate::lifecycle::ManagedComponent>) {
        self.supervisor.manage(component);
    }

    /// Start components, background tasks and listeners.
    ///
    /// When anything after the components fails, the components are
    /// stopped again before the error is returned.
    pub async fn start(self) -> Result<RunningGateway, StartupError> {
        let Gateway {
            config,
            gate,
            cache,
            health,
            mut supervisor,
        } = self;
        let drain = Duration::from_secs(config.timeouts.shutdown_secs);

        supervisor.start_all().await?;

        let shutdown = Shutdown::new();
        match bring_up(&config, gate, cache, health, &shutdown).await {
            Ok(listeners) => Ok(RunningGateway {
                local_addr: listeners.public,
                admin_addr: listeners.admin,
                tasks: listeners.tasks,
                shutdown,
                supervisor,
                drain,
            }),
            Err(e) => {
                tracing::error!(error = %e, "Startup aborted, stopping components");
                shutdown.trigger();
                stop_components(&mut supervisor).await;
                Err(e)
            }
        }
    }
}

struct Listeners {
    public: SocketAddr,
    admin: Option<SocketAddr>,
    tasks: Vec<JoinHandle<std::io::Result<()>>>,
}

async fn bring_up(
    config: &GatewayConfig,
    gate: Arc<AuthGate>,
    cache: Option<Arc<CachingAuthenticator>>,
    health: Arc<HealthRegistry>,
    shutdown: &Shutdown,
) -> Result<Listeners, StartupError> {
    let observability = &config.observability;
    if observability.metrics_enabled {
        let addr = parse_addr("observability.metrics_address", &observability.metrics_address)?;
        metrics::init_metrics(addr)?;
    }

    let monitor = HealthMonitor::new(health.clone(), config.health_check.clone());
    tokio::spawn(monitor.run(shutdown.subscribe()));

    let mut tasks = Vec::new();

    let public_addr = parse_addr("listener.bind_address", &config.listener.bind_address)?;
    let listener = bind(public_addr).await?;
    let public = listener.local_addr().map_err(StartupError::Serve)?;
    let server = GatewayServer::new(config.clone(), gate.clone());
    match &config.listener.tls {
        None => tasks.push(tokio::spawn(server.run(listener, shutdown.signalled()))),
        Some(tls) => {
            let rustls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .map_err(StartupError::Tls)?;
            let listener = listener.into_std().map_err(StartupError::Serve)?;
            tasks.push(tokio::spawn(server.run_tls(listener, rustls, shutdown.signalled())));
        }
    }

    let admin = if config.admin.enabled {
        let addr = parse_addr("admin.bind_address", &config.admin.bind_address)?;
        let listener = bind(addr).await?;
        let local = listener.local_addr().map_err(StartupError::Serve)?;
        let app = setup_admin_router(AdminState {
            api_key: Arc::from(config.admin.api_key.as_str()),
            realm: Arc::from(gate.realm()),
            health,
            cache,
        });
        let stop = shutdown.signalled();
        tracing::info!(address = %local, "Admin endpoint listening");
        tasks.push(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(stop)
                .await
        }));
        Some(local)
    } else {
        None
    };

    Ok(Listeners {
        public,
        admin,
        tasks,
    })
}

/// A started gateway. Dropping it without `wait` leaves listeners running.
pub struct RunningGateway {
    local_addr: SocketAddr,
    admin_addr: Option<SocketAddr>,
    tasks: Vec<JoinHandle<std::io::Result<()>>>,
    shutdown: Shutdown,
    supervisor: Supervisor,
    drain: Duration,
}

impl RunningGateway {
    /// Address the public listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_addr
    }

    pub fn component_states(&self) -> Vec<(String, ComponentState)> {
        self.supervisor.states()
    }

    /// Serve until `signal` resolves or a listener dies, then shut down.
    ///
    /// Shutdown order: listeners stop accepting and drain, then components
    /// stop in reverse start order. Draining is bounded by
    /// `timeouts.shutdown_secs`, and so is each component's `stop()`.
    pub async fn wait<F>(self, signal: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()>,
    {
        let RunningGateway {
            tasks,
            shutdown,
            mut supervisor,
            drain,
            ..
        } = self;

        let mut listeners = select_all(tasks);
        let outcome = tokio::select! {
            _ = signal => {
                tracing::info!("Shutdown requested, draining listeners");
                Ok(())
            }
            (joined, _, _) = &mut listeners => {
                let error = match joined {
                    Ok(Ok(())) => std::io::Error::other("listener exited unexpectedly"),
                    Ok(Err(e)) => e,
                    Err(e) => std::io::Error::other(e),
                };
                tracing::error!(error = %error, "Listener failed, shutting down");
                Err(StartupError::Serve(error))
            }
        };

        shutdown.trigger();
        if bounded(drain, join_all(listeners.into_inner())).await.is_err() {
            tracing::warn!(deadline = ?drain, "Listeners did not drain before the deadline");
        }
        stop_components(&mut supervisor).await;

        tracing::info!("Shutdown complete");
        outcome
    }

    /// Shut down immediately.
    pub async fn shutdown(self) -> Result<(), StartupError> {
        self.wait(std::future::ready(())).await
    }
}

/// Assemble, start and serve until SIGINT/SIGTERM.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    let running = assemble(config)?.start().await?;
    running.wait(wait_for_shutdown()).await
}

async fn stop_components(supervisor: &mut Supervisor) {
    for failure in supervisor.stop_all().await {
        tracing::error!(error = %failure, "Component did not stop cleanly");
    }
}

fn parse_addr(field: &'static str, address: &str) -> Result<SocketAddr, StartupError> {
    address.parse().map_err(|_| StartupError::Address {
        field,
        address: address.to_string(),
    })
}

async fn bind(address: SocketAddr) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind { address, source })
}
