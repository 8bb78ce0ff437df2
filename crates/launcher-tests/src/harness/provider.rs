use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use launcher_node::shutdown::shutdown_requested;
use launcher_protocol::{
    MAX_LINE_BYTES, PROTOCOL_VERSION, ProviderRequest, ProviderResponse, Signal,
};
use launcher_session::{DeviceSession, Parcelable, UserSession};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, watch};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

#[derive(Default)]
struct Records {
    device: DeviceSession,
    user: UserSession,
}

struct Shared {
    records: Mutex<Records>,
    device_calls: AtomicUsize,
    user_calls: AtomicUsize,
    subscribers: AtomicUsize,
    stalled: AtomicBool,
    signals: broadcast::Sender<Signal>,
}

/// A session provider on a temp Unix socket.
///
/// Unset records are answered with an empty parcel, like a provider with
/// nobody logged in.
pub struct TestProvider {
    pub socket_path: PathBuf,
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    _socket_dir: Option<TempDir>,
}

impl TestProvider {
    pub async fn spawn() -> Result<Self> {
        let socket_dir = TempDir::new()?;
        let mut provider = Self::spawn_at(&socket_dir.path().join("provider.sock")).await?;
        provider._socket_dir = Some(socket_dir);
        Ok(provider)
    }

    /// Bind at `socket_path`, replacing whatever a previous provider left there.
    pub async fn spawn_at(socket_path: &Path) -> Result<Self> {
        let socket_path = socket_path.to_path_buf();
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }
        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("failed to bind {}", socket_path.display()))?;

        let (signals, _) = broadcast::channel(64);
        let shared = Arc::new(Shared {
            records: Mutex::new(Records::default()),
            device_calls: AtomicUsize::new(0),
            user_calls: AtomicUsize::new(0),
            subscribers: AtomicUsize::new(0),
            stalled: AtomicBool::new(false),
            signals,
        });
        let (shutdown, _) = watch::channel(false);

        let accept_shared = shared.clone();
        let accept_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { break };
                        let shared = accept_shared.clone();
                        let shutdown = accept_shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(shared, stream, shutdown).await {
                                tracing::debug!(err = %e, "provider connection ended");
                            }
                        });
                    }
                    _ = shutdown_requested(accept_shutdown.clone()) => break,
                }
            }
        });

        Ok(Self {
            socket_path,
            shared,
            shutdown,
            _socket_dir: None,
        })
    }

    pub fn set_device(&self, session: impl Into<DeviceSession>) {
        self.records().device = session.into();
    }

    pub fn set_user(&self, session: impl Into<UserSession>) {
        self.records().user = session.into();
    }

    pub fn device_calls(&self) -> usize {
        self.shared.device_calls.load(Ordering::SeqCst)
    }

    pub fn user_calls(&self) -> usize {
        self.shared.user_calls.load(Ordering::SeqCst)
    }

    /// Connections that have completed a subscribe handshake.
    pub fn subscribers(&self) -> usize {
        self.shared.subscribers.load(Ordering::SeqCst)
    }

    /// While stalled, device and user queries are read but never answered.
    pub fn stall(&self, stalled: bool) {
        self.shared.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Broadcast a signal to every subscribed connection.
    pub fn signal(&self, signal: Signal) {
        let _ = self.shared.signals.send(signal);
    }

    /// Stop accepting and drop every open connection.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    fn records(&self) -> std::sync::MutexGuard<'_, Records> {
        lock(&self.shared)
    }
}

impl Drop for TestProvider {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

async fn serve_connection(
    shared: Arc<Shared>,
    stream: UnixStream,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (r, w) = stream.into_split();
    let mut reader = FramedRead::new(r, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
    let mut writer = FramedWrite::new(w, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    let hello = ProviderResponse::Hello {
        protocol_version: PROTOCOL_VERSION,
    };
    writer.send(serde_json::to_string(&hello)?).await?;

    // Set once this connection subscribes.
    let mut signal_rx: Option<broadcast::Receiver<Signal>> = None;

    loop {
        tokio::select! {
            line = reader.next() => {
                let Some(line) = line else { break };
                let req: ProviderRequest = serde_json::from_str(&line?)?;
                if req != ProviderRequest::Subscribe && shared.stalled.load(Ordering::SeqCst) {
                    continue;
                }
                let resp = match req {
                    ProviderRequest::GetDeviceData => {
                        shared.device_calls.fetch_add(1, Ordering::SeqCst);
                        let parcel = lock(&shared).device.to_parcel().to_vec();
                        ProviderResponse::DeviceData { parcel }
                    }
                    ProviderRequest::GetUserData => {
                        shared.user_calls.fetch_add(1, Ordering::SeqCst);
                        let parcel = lock(&shared).user.to_parcel().to_vec();
                        ProviderResponse::UserData { parcel }
                    }
                    ProviderRequest::Subscribe => {
                        // Register before acknowledging so no signal sent after
                        // the ack can be missed.
                        signal_rx = Some(shared.signals.subscribe());
                        shared.subscribers.fetch_add(1, Ordering::SeqCst);
                        ProviderResponse::Subscribed
                    }
                };
                writer.send(serde_json::to_string(&resp)?).await?;
            }
            signal = recv_signal(&mut signal_rx) => {
                let Some(signal) = signal else { break };
                writer.send(serde_json::to_string(&ProviderResponse::Signal(signal))?).await?;
            }
            _ = shutdown_requested(shutdown.clone()) => break,
        }
    }
    Ok(())
}

fn lock(shared: &Shared) -> std::sync::MutexGuard<'_, Records> {
    shared
        .records
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Next signal for a subscribed connection; pends forever otherwise.
async fn recv_signal(rx: &mut Option<broadcast::Receiver<Signal>>) -> Option<Signal> {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(signal) => return Some(signal),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
