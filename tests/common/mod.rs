//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use auth_gateway::auth::{BindOutcome, DirectoryConnector, DirectoryError, DirectorySession};
use auth_gateway::config::{
    AuthBackend, BindConfig, CacheConfig, DirectoryConfig, GatewayConfig,
};
use tokio::net::TcpListener;

pub const ADMIN_KEY: &str = "integration-admin-key";
pub const REALM: &str = "Integration Realm";

/// Static backend with `alice:secret`, ephemeral ports, admin enabled.
pub fn static_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.auth.realm = REALM.into();
    config.auth.users.insert("alice".into(), "secret".into());
    config.health_check.enabled = false;
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.into();
    config.admin.bind_address = "127.0.0.1:0".into();
    config
}

/// Directory backend using direct binds against `url`.
pub fn directory_config(url: &str, timeout_ms: u64) -> GatewayConfig {
    let mut config = static_config();
    config.auth.users.clear();
    config.auth.backend = AuthBackend::Directory;
    config.auth.directory = Some(DirectoryConfig {
        url: url.to_string(),
        starttls: false,
        timeout_ms,
        bind: BindConfig::Direct {
            dn_template: "uid={username},ou=people,dc=example,dc=org".into(),
        },
        cache: CacheConfig::default(),
    });
    config
}

/// A TCP endpoint that accepts connections and never answers.
///
/// Any LDAP operation against it hangs until the caller gives up.
pub async fn start_silent_directory() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// In-memory directory keyed by DN, counting every connection.
#[derive(Clone, Default)]
pub struct FakeDirectory {
    entries: Arc<HashMap<String, String>>,
    pub connections: Arc<AtomicUsize>,
}

impl FakeDirectory {
    pub fn with_users(users: &[(&str, &str)]) -> Self {
        let entries = users
            .iter()
            .map(|(uid, password)| {
                (
                    format!("uid={},ou=people,dc=example,dc=org", uid),
                    password.to_string(),
                )
            })
            .collect();
        Self {
            entries: Arc::new(entries),
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

struct FakeSession {
    entries: Arc<HashMap<String, String>>,
}

#[async_trait]
impl DirectoryConnector for FakeDirectory {
    fn endpoint(&self) -> &str {
        "fake://directory"
    }

    async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            entries: self.entries.clone(),
        }))
    }
}

#[async_trait]
impl DirectorySession for FakeSession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<BindOutcome, DirectoryError> {
        // Anonymous binds are accepted, as most servers do.
        if dn.is_empty() {
            return Ok(BindOutcome::Bound);
        }
        match self.entries.get(dn) {
            Some(expected) if expected == password => Ok(BindOutcome::Bound),
            _ => Ok(BindOutcome::InvalidCredentials),
        }
    }

    async fn search_dn(&mut self, _base: &str, _filter: &str) -> Result<Option<String>, DirectoryError> {
        Ok(None)
    }

    async fn unbind(&mut self) {}
}

/// Client with no pooled connections, so shutdown never waits on idle sockets.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
