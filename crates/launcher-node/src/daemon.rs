use crate::config::NodeConfig;
use crate::handler::NodeState;
use crate::shutdown::{ShutdownTrigger, shutdown_requested};
use crate::socket;
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use launcher_session::{SessionBroker, StartupSnapshot};
use std::sync::Arc;
use tokio::sync::watch;

/// Decode base64 parcels passed at launch. Unusable input is logged and dropped.
pub fn decode_snapshot(device: Option<&str>, user: Option<&str>) -> StartupSnapshot {
    let decode = |label: &str, encoded: Option<&str>| -> Option<Vec<u8>> {
        let encoded = encoded?;
        match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(
                    err = %e,
                    kind = label,
                    "launch session is not valid base64, ignoring it"
                );
                None
            }
        }
    };
    let device = decode("device", device);
    let user = decode("user", user);
    StartupSnapshot::from_parcels(device.as_deref(), user.as_deref())
}

/// Run the node until `shutdown_tx` reads `true`, set either by the caller
/// or by a shutdown-requested signal from the provider.
pub async fn run(
    config: NodeConfig,
    snapshot: StartupSnapshot,
    shutdown_tx: watch::Sender<bool>,
) -> Result<()> {
    let shutdown_rx = shutdown_tx.subscribe();
    let terminator = Arc::new(ShutdownTrigger::new(shutdown_tx));
    let broker = SessionBroker::start(&config.broker, snapshot, terminator).await;
    let state = NodeState::new(broker.clone());

    let result = tokio::select! {
        result = socket::serve(state, &config.socket_path) => {
            result.context("socket server failed")
        }
        _ = shutdown_requested(shutdown_rx) => {
            tracing::info!("shutting down");
            Ok(())
        }
    };

    broker.shutdown().await;
    std::fs::remove_file(&config.socket_path).ok();
    tracing::info!("launcher-node shut down");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use launcher_session::{DeviceSession, DeviceSessionData, Parcelable, UserSession};

    #[test]
    fn snapshot_decodes_base64_parcels() {
        let device = DeviceSession::from(DeviceSessionData {
            store_number: Some("121".into()),
            device_id: Some("dev-1".into()),
            ..Default::default()
        });
        let encoded_device = STANDARD.encode(device.to_parcel());
        let encoded_user = STANDARD.encode(UserSession::Empty.to_parcel());

        let snapshot = decode_snapshot(Some(&encoded_device), Some(&encoded_user));
        assert_eq!(snapshot.device, Some(device));
        assert_eq!(snapshot.user, Some(UserSession::Empty));
    }

    #[test]
    fn bad_base64_is_treated_as_absent() {
        let snapshot = decode_snapshot(Some("%%%"), None);
        assert!(snapshot.device.is_none());
        assert!(snapshot.user.is_none());
    }
}
