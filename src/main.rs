//! Authentication gateway
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ listener ──▶ request id / trace / timeout
//!                               │
//!                               ▼
//!                           AuthGate ── extract Basic credentials
//!                               │
//!                               ▼
//!                     CachingAuthenticator (TTL, bounded)
//!                               │ miss
//!                               ▼
//!                     DirectoryAuthenticator ──▶ LDAP server
//!                               │
//!          401 + challenge ◀────┼────▶ 503 (backend unavailable)
//!                               ▼
//!                     {uri_prefix}/whoami
//!
//!   Admin listener: /admin/status, /admin/healthcheck, /admin/cache
//!   Supervisor: managed components, started before listeners,
//!               stopped in reverse after them
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use auth_gateway::config::load_config;
use auth_gateway::lifecycle::startup;
use auth_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "auth-gateway", version, about = "HTTP Basic authentication gateway")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logging is configured from the file, so config errors go to stderr.
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        bind_address = %config.listener.bind_address,
        backend = ?config.auth.backend,
        components = config.components.len(),
        "auth-gateway starting"
    );

    match startup::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway terminated with an error");
            ExitCode::FAILURE
        }
    }
}
