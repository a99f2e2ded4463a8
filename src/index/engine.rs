//! Index engine node as a managed component.

use std::io::{ErrorKind, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use fs2::FileExt;
use serde::Serialize;
use tokio::fs;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::IndexEngineConfig;
use crate::lifecycle::managed::{ComponentError, ManagedComponent};
use crate::resilience::bounded;

const LOCK_FILE: &str = "node.lock";
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of `GET /` on the node's status listener.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    pub name: String,
    pub node_id: Uuid,
    pub status: &'static str,
    pub default_fetch_size: usize,
}

struct StatusServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// Held lock on `node.lock`; released by `release` or when the process dies.
struct NodeLock {
    path: PathBuf,
    file: std::fs::File,
}

impl NodeLock {
    /// Remove the file while still holding the lock, then unlock.
    fn release(self) -> std::io::Result<()> {
        let removed = match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        };
        let _ = self.file.unlock();
        removed
    }
}

struct Running {
    lock: NodeLock,
    http: Option<StatusServer>,
}

pub struct IndexEngine {
    config: IndexEngineConfig,
    node_id: Uuid,
    running: Option<Running>,
}

impl IndexEngine {
    pub fn new(config: IndexEngineConfig) -> Self {
        Self {
            config,
            node_id: Uuid::new_v4(),
            running: None,
        }
    }

    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Address of the status listener while running with `enable_http`.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.running
            .as_ref()
            .and_then(|r| r.http.as_ref())
            .map(|s| s.addr)
    }

    fn lock_path(&self) -> PathBuf {
        self.config.data_directory.join(LOCK_FILE)
    }

    /// Take an OS-level exclusive lock on the node's lock file.
    ///
    /// The lock belongs to the open handle, so it disappears with the process;
    /// a file left behind by a crashed node does not block the next start.
    async fn take_lock(&self) -> Result<NodeLock, ComponentError> {
        fs::create_dir_all(&self.config.data_directory).await?;

        let path = self.lock_path();
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(ComponentError::Failed(format!(
                "data directory {} is locked by another node",
                self.config.data_directory.display()
            )));
        }

        let owner = format!("{}\n{}\n", self.node_id, std::process::id());
        let written = file
            .set_len(0)
            .and_then(|()| file.write_all(owner.as_bytes()))
            .and_then(|()| file.flush());
        let lock = NodeLock { path, file };
        if let Err(e) = written {
            let _ = lock.release();
            return Err(ComponentError::Io(e));
        }
        Ok(lock)
    }

    async fn serve_status(&self) -> Result<StatusServer, ComponentError> {
        let listener =
            TcpListener::bind((self.config.bind_host.as_str(), self.config.http_port)).await?;
        let addr = listener.local_addr()?;

        let status = NodeStatus {
            name: self.config.name.clone(),
            node_id: self.node_id,
            status: "green",
            default_fetch_size: self.config.default_fetch_size,
        };
        let router = Router::new().route(
            "/",
            get(move || {
                let status = status.clone();
                async move { Json(status) }
            }),
        );

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });

        Ok(StatusServer {
            addr,
            shutdown,
            task,
        })
    }
}

#[async_trait]
impl ManagedComponent for IndexEngine {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn start(&mut self) -> Result<(), ComponentError> {
        if self.running.is_some() {
            return Ok(());
        }

        let lock = self.take_lock().await?;

        let http = if self.config.enable_http {
            match self.serve_status().await {
                Ok(server) => Some(server),
                Err(e) => {
                    // Nothing else was acquired yet; give the lock back.
                    let _ = lock.release();
                    return Err(e);
                }
            }
        } else {
            None
        };

        tracing::info!(
            component = %self.config.name,
            node_id = %self.node_id,
            data_directory = %self.config.data_directory.display(),
            http = ?http.as_ref().map(|s| s.addr),
            "Index engine node started"
        );
        self.running = Some(Running { lock, http });
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ComponentError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        let mut result = Ok(());

        if let Some(server) = running.http {
            let _ = server.shutdown.send(());
            let abort = server.task.abort_handle();
            match bounded(STOP_TIMEOUT, server.task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => result = Err(ComponentError::Io(e)),
                Ok(Err(join)) => result = Err(ComponentError::Failed(join.to_string())),
                Err(elapsed) => {
                    abort.abort();
                    result = Err(ComponentError::Failed(format!(
                        "status listener did not drain: {}",
                        elapsed
                    )));
                }
            }
        }

        // The lock is released even if the listener misbehaved.
        if let Err(e) = running.lock.release() {
            if result.is_ok() {
                result = Err(ComponentError::Io(e));
            }
        }

        tracing::info!(component = %self.config.name, node_id = %self.node_id, "Index engine node stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path, enable_http: bool) -> IndexEngineConfig {
        IndexEngineConfig {
            name: "search".into(),
            data_directory: dir.join("index"),
            bind_host: "127.0.0.1".into(),
            enable_http,
            http_port: 0,
            default_fetch_size: 50,
        }
    }

    #[tokio::test]
    async fn test_start_takes_lock_and_stop_releases_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = IndexEngine::new(config(dir.path(), false));

        engine.start().await.unwrap();
        assert!(engine.is_running());
        let lock = dir.path().join("index").join(LOCK_FILE);
        let contents = std::fs::read_to_string(&lock).unwrap();
        assert!(contents.starts_with(&engine.node_id().to_string()));

        engine.stop().await.unwrap();
        assert!(!engine.is_running());
        assert!(!lock.exists());
    }

    #[tokio::test]
    async fn test_second_node_on_same_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = IndexEngine::new(config(dir.path(), false));
        let mut second = IndexEngine::new(config(dir.path(), false));

        first.start().await.unwrap();
        let err = second.start().await.unwrap_err();
        assert!(err.to_string().contains("locked"));
        assert!(!second.is_running());

        first.stop().await.unwrap();
        second.start().await.unwrap();
        second.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_leftover_lock_file_from_dead_node_does_not_block_start() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index");
        std::fs::create_dir_all(&index).unwrap();
        std::fs::write(index.join(LOCK_FILE), "00000000-0000-0000-0000-000000000000\n999999\n").unwrap();

        let mut engine = IndexEngine::new(config(dir.path(), false));
        engine.start().await.unwrap();
        let contents = std::fs::read_to_string(index.join(LOCK_FILE)).unwrap();
        assert!(contents.starts_with(&engine.node_id().to_string()));
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_held_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = IndexEngine::new(config(dir.path(), false));
        engine.start().await.unwrap();

        let other = std::fs::OpenOptions::new()
            .write(true)
            .open(dir.path().join("index").join(LOCK_FILE))
            .unwrap();
        assert!(other.try_lock_exclusive().is_err());

        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = IndexEngine::new(config(dir.path(), false));
        engine.stop().await.unwrap();
        engine.start().await.unwrap();
        engine.stop().await.unwrap();
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_listener_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = IndexEngine::new(config(dir.path(), true));
        engine.start().await.unwrap();

        let addr = engine.http_addr().unwrap();
        let body: serde_json::Value = reqwest::get(format!("http://{}/", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "green");
        assert_eq!(body["default_fetch_size"], 50);

        engine.stop().await.unwrap();
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_bind_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut cfg = config(dir.path(), true);
        cfg.http_port = taken.local_addr().unwrap().port();

        let mut engine = IndexEngine::new(cfg);
        assert!(engine.start().await.is_err());
        assert!(!dir.path().join("index").join(LOCK_FILE).exists());
    }
}
