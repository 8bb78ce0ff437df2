use anyhow::Result;
use clap::Parser;
use launcher_node::{NodeConfig, decode_snapshot};
use std::path::PathBuf;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about = "launcher node daemon")]
struct Args {
    /// Path to the command Unix socket.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Path to the session provider's Unix socket.
    #[arg(long)]
    provider_socket: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/launcher/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Device session handed over at launch, as a base64 parcel.
    #[arg(long)]
    device_session: Option<String>,

    /// User session handed over at launch, as a base64 parcel.
    #[arg(long)]
    user_session: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "launcher_node=info,launcher_session=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = NodeConfig::load(args.config.as_deref())?;
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }
    if let Some(provider_socket) = args.provider_socket {
        config.broker.provider_socket = provider_socket;
    }

    let snapshot = decode_snapshot(args.device_session.as_deref(), args.user_session.as_deref());

    let (shutdown_tx, _) = watch::channel(false);
    let on_sigint = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received SIGINT, shutting down");
            on_sigint.send_replace(true);
        }
    });

    launcher_node::run(config, snapshot, shutdown_tx).await
}
