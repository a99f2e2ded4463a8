//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Public listener (bind address, TLS).
    pub listener: ListenerConfig,

    /// Prefix under which protected resources are mounted, e.g. "/api".
    /// Empty or starting with '/', never ending with '/'.
    pub uri_prefix: String,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Authentication backend and realm.
    pub auth: AuthConfig,

    /// Health probe scheduling.
    pub health_check: HealthCheckConfig,

    /// Managed components, started in this order and stopped in reverse.
    pub components: Vec<ComponentConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Operations endpoint.
    pub admin: AdminConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            uri_prefix: "/api".to_string(),
            timeouts: TimeoutConfig::default(),
            auth: AuthConfig::default(),
            health_check: HealthCheckConfig::default(),
            components: Vec::new(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Upper bound on stopping all managed components, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_secs: 30,
        }
    }
}

/// Which authenticator guards the protected routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthBackend {
    Static,
    Directory,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Realm named in `WWW-Authenticate` challenges.
    pub realm: String,

    pub backend: AuthBackend,

    /// Allow-list for the static backend (username -> password).
    pub users: HashMap<String, String>,

    /// Directory settings, required when `backend = "directory"`.
    pub directory: Option<DirectoryConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: "auth-gateway".to_string(),
            backend: AuthBackend::Static,
            users: HashMap::new(),
            directory: None,
        }
    }
}

/// Directory (LDAP) connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    /// Server URL, `ldap://host:389` or `ldaps://host:636`.
    pub url: String,

    /// Upgrade a plain connection with StartTLS.
    #[serde(default)]
    pub starttls: bool,

    /// Connect + bind + search deadline in milliseconds.
    #[serde(default = "default_directory_timeout_ms")]
    pub timeout_ms: u64,

    pub bind: BindConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_directory_timeout_ms() -> u64 {
    2000
}

/// How user credentials are bound against the directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BindConfig {
    /// Bind as `dn_template` with `{username}` replaced.
    Direct { dn_template: String },
    /// Search `base` with `filter` (containing `{username}`), then bind as
    /// the found entry. The service account is used for the search when set.
    Search {
        base: String,
        filter: String,
        #[serde(default)]
        service_dn: Option<String>,
        #[serde(default)]
        service_password: Option<String>,
    },
}

/// Verification cache policy. `ttl_secs = 0` disables caching.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
    pub cache_denials: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            max_entries: 10_000,
            cache_denials: true,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Run probes periodically in the background.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
        }
    }
}

/// A managed component, tagged by `kind`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentConfig {
    IndexEngine(IndexEngineConfig),
}

impl ComponentConfig {
    pub fn name(&self) -> &str {
        match self {
            ComponentConfig::IndexEngine(c) => &c.name,
        }
    }
}

/// Embedded index engine node.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexEngineConfig {
    pub name: String,

    /// Directory holding the node's data and lock file.
    pub data_directory: PathBuf,

    /// Address the status listener binds to when `enable_http` is set.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    #[serde(default)]
    pub enable_http: bool,

    /// Port of the status listener; 0 picks a free port.
    #[serde(default = "default_index_http_port")]
    pub http_port: u16,

    /// Default page size for search operations.
    #[serde(default = "default_fetch_size")]
    pub default_fetch_size: usize,
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_index_http_port() -> u16 {
    9200
}

fn default_fetch_size() -> usize {
    100
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter (trace, debug, info, warn, error, or a directive list).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Placeholder API key shipped in defaults; rejected when admin is enabled.
pub const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin (operations) endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoint.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin endpoint bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: ADMIN_KEY_PLACEHOLDER.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
