use anyhow::Result;
use launcher_node::LauncherClient;
use launcher_protocol::{Command, CommandResponse};
use std::path::Path;

/// Convenience wrapper over `LauncherClient` for integration tests.
pub struct TestClient {
    inner: LauncherClient,
}

impl TestClient {
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        let inner = LauncherClient::connect(socket_path).await?;
        Ok(Self { inner })
    }

    pub fn version(&self) -> &str {
        self.inner.version()
    }

    pub async fn get_device(&mut self) -> Result<CommandResponse> {
        self.inner.call(Command::GetDevice).await
    }

    pub async fn get_user(&mut self) -> Result<CommandResponse> {
        self.inner.call(Command::GetUser).await
    }

    pub async fn get_settings(&mut self) -> Result<CommandResponse> {
        self.inner.call(Command::GetSettings).await
    }

    /// Settings data, failing on an Error response.
    pub async fn settings(&mut self) -> Result<serde_json::Value> {
        Ok(self
            .inner
            .request(Command::GetSettings)
            .await?
            .unwrap_or_default())
    }

    /// Send an arbitrary line, e.g. an action the node does not route.
    pub async fn raw(&mut self, line: &str) -> Result<CommandResponse> {
        self.inner.call_line(line).await
    }
}
