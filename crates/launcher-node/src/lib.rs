//! Launcher node: hosts a [`launcher_session::SessionBroker`] and answers
//! application commands over a Unix socket.

pub mod client;
pub mod config;
pub mod daemon;
pub mod handler;
pub mod shutdown;
pub mod socket;

pub use client::LauncherClient;
pub use config::NodeConfig;
pub use daemon::{decode_snapshot, run};
pub use shutdown::ShutdownTrigger;
