use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::projector::ProjectorConfig;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BrokerConfig {
    pub provider_socket: PathBuf,
    /// How long startup waits for the provider bind before serving anyway.
    pub connect_grace_ms: u64,
    /// Pause between attempts to win back a lost provider link.
    pub reconnect_interval_ms: u64,
    /// Deadline for a single provider query.
    pub request_timeout_ms: u64,
    pub signal_buffer: usize,
    pub projector: ProjectorConfig,
}

impl BrokerConfig {
    pub fn connect_grace(&self) -> Duration {
        Duration::from_millis(self.connect_grace_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            provider_socket: launcher_protocol::paths::default_provider_socket_path(),
            connect_grace_ms: 250,
            reconnect_interval_ms: 500,
            request_timeout_ms: 5000,
            signal_buffer: 64,
            projector: ProjectorConfig::default(),
        }
    }
}
