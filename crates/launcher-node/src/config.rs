use anyhow::{Context, Result};
use launcher_session::BrokerConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NodeConfig {
    /// Where the command surface listens.
    pub socket_path: PathBuf,
    pub broker: BrokerConfig,
}

impl NodeConfig {
    /// Load `path`, or the default config file if none is given.
    ///
    /// A missing default file means defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = Self::config_path();
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn config_path() -> PathBuf {
        launcher_protocol::paths::config_path()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            socket_path: launcher_protocol::paths::default_command_socket_path(),
            broker: BrokerConfig::default(),
        }
    }
}
