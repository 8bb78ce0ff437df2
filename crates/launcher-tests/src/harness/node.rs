use anyhow::Result;
use launcher_node::NodeConfig;
use launcher_session::{BrokerConfig, StartupSnapshot};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A launcher node running in-process against a given provider socket.
pub struct TestNode {
    pub socket_path: PathBuf,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<Result<()>>>,
    _socket_dir: TempDir,
}

impl TestNode {
    pub async fn spawn(provider_socket: &Path) -> Result<Self> {
        Self::spawn_with_snapshot(provider_socket, StartupSnapshot::default()).await
    }

    pub async fn spawn_with_snapshot(
        provider_socket: &Path,
        snapshot: StartupSnapshot,
    ) -> Result<Self> {
        let socket_dir = TempDir::new()?;
        let socket_path = socket_dir.path().join("launcher.sock");
        let config = NodeConfig {
            socket_path: socket_path.clone(),
            broker: BrokerConfig {
                provider_socket: provider_socket.to_path_buf(),
                connect_grace_ms: 500,
                reconnect_interval_ms: 50,
                request_timeout_ms: 300,
                ..BrokerConfig::default()
            },
        };

        let (shutdown_tx, _) = watch::channel(false);
        let task = tokio::spawn(launcher_node::run(config, snapshot, shutdown_tx.clone()));

        // Wait for socket to be ready
        for _ in 0..100 {
            if socket_path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        Ok(Self {
            socket_path,
            shutdown_tx,
            task: Some(task),
            _socket_dir: socket_dir,
        })
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wait for the node to exit on its own. Returns whether it did in time.
    pub async fn wait_stopped(&mut self, timeout: Duration) -> bool {
        let Some(task) = self.task.take() else {
            return true;
        };
        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => {
                if let Ok(Err(e)) = joined {
                    tracing::debug!(err = %e, "node exited with error");
                }
                true
            }
            Err(_) => false,
        }
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
