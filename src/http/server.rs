//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the protected resources under `uri_prefix`
//! - Put the authentication gate in front of every route
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve plain TCP or TLS until shutdown is signalled

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::gate::{require_principal, AuthGate};
use crate::http::resources;

/// In-flight requests get this long to finish once a TLS listener is told to stop.
const TLS_DRAIN_SECS: u64 = 10;

/// Public HTTP front of the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, gate: Arc<AuthGate>) -> Self {
        let router = Self::build_router(&config, gate);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, gate: Arc<AuthGate>) -> Router {
        let app = if config.uri_prefix.is_empty() {
            resources::router()
        } else {
            Router::new().nest(&config.uri_prefix, resources::router())
        };

        app.layer(middleware::from_fn_with_state(gate, require_principal))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, prefix = %self.config.uri_prefix, "Gateway listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Gateway listener stopped");
        Ok(())
    }

    /// Serve HTTPS on an already bound `listener` until `shutdown` fires.
    pub async fn run_tls(
        self,
        listener: std::net::TcpListener,
        tls: RustlsConfig,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let handle = axum_server::Handle::new();
        let stopper = handle.clone();
        tokio::spawn(async move {
            shutdown.await;
            stopper.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        tracing::info!(address = %addr, prefix = %self.config.uri_prefix, "Gateway listening (TLS)");
        axum_server::from_tcp_rustls(listener, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("Gateway TLS listener stopped");
        Ok(())
    }
}
