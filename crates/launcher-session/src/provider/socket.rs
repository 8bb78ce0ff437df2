//! Unix-socket binding to the session provider.
//!
//! The provider speaks JSON lines: it greets every connection with
//! `hello`, answers `get_device_data`/`get_user_data` with parcel-encoded
//! records, and turns a connection into a signal stream on `subscribe`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use launcher_protocol::{
    MAX_LINE_BYTES, PROTOCOL_VERSION, ProviderRequest, ProviderResponse, Signal,
};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, warn};

use super::{Connector, ServiceFuture, SessionService, SignalSource};
use crate::error::TransportError;
use crate::model::{DeviceSession, UserSession};
use crate::parcel::Parcelable;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One JSON-lines connection to the provider, past the hello handshake.
struct ProviderConnection {
    reader: FramedRead<OwnedReadHalf, LinesCodec>,
    writer: FramedWrite<OwnedWriteHalf, LinesCodec>,
}

impl ProviderConnection {
    async fn open(socket_path: &Path) -> Result<Self, TransportError> {
        let stream = UnixStream::connect(socket_path).await?;
        let (r, w) = stream.into_split();
        let mut conn = Self {
            reader: FramedRead::new(r, LinesCodec::new_with_max_length(MAX_LINE_BYTES)),
            writer: FramedWrite::new(w, LinesCodec::new_with_max_length(MAX_LINE_BYTES)),
        };

        let hello = tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.next_response())
            .await
            .map_err(|_| TransportError::Protocol("timed out waiting for provider hello".into()))??;
        match hello {
            ProviderResponse::Hello { protocol_version }
                if protocol_version == PROTOCOL_VERSION =>
            {
                Ok(conn)
            }
            ProviderResponse::Hello { protocol_version } => Err(TransportError::Protocol(format!(
                "provider speaks protocol {protocol_version}, expected {PROTOCOL_VERSION}"
            ))),
            other => Err(TransportError::Protocol(format!(
                "expected provider hello, got {other:?}"
            ))),
        }
    }

    async fn send(&mut self, req: &ProviderRequest) -> Result<(), TransportError> {
        let line = serde_json::to_string(req)?;
        self.writer.send(line).await?;
        Ok(())
    }

    async fn next_response(&mut self) -> Result<ProviderResponse, TransportError> {
        let Some(line) = self.reader.next().await else {
            return Err(TransportError::Disconnected);
        };
        Ok(serde_json::from_str(&line?)?)
    }

    /// Send a request and wait for its answer, skipping greetings and signals.
    async fn request(&mut self, req: &ProviderRequest) -> Result<ProviderResponse, TransportError> {
        self.send(req).await?;
        loop {
            match self.next_response().await? {
                ProviderResponse::Hello { .. } | ProviderResponse::Signal(_) => continue,
                ProviderResponse::Error { message } => return Err(TransportError::Remote(message)),
                resp => return Ok(resp),
            }
        }
    }
}

/// Query connection to a bound provider. Calls are serialized on the socket.
pub struct SocketSessionService {
    conn: Mutex<ProviderConnection>,
    request_timeout: Duration,
}

impl SocketSessionService {
    pub async fn connect(
        socket_path: &Path,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let conn = ProviderConnection::open(socket_path).await?;
        debug!(path = %socket_path.display(), "session provider handshake complete");
        Ok(Self {
            conn: Mutex::new(conn),
            request_timeout,
        })
    }

    /// One request/answer exchange, bounded by the request timeout.
    async fn query(&self, req: &ProviderRequest) -> Result<ProviderResponse, TransportError> {
        tokio::time::timeout(self.request_timeout, async {
            let mut conn = self.conn.lock().await;
            conn.request(req).await
        })
        .await
        .map_err(|_| TransportError::TimedOut(self.request_timeout))?
    }
}

impl SessionService for SocketSessionService {
    fn get_device_data(&self) -> ServiceFuture<'_, DeviceSession> {
        Box::pin(async move {
            match self.query(&ProviderRequest::GetDeviceData).await? {
                ProviderResponse::DeviceData { parcel } => Ok(DeviceSession::from_parcel(&parcel)?),
                other => Err(TransportError::Protocol(format!(
                    "unexpected reply to get_device_data: {other:?}"
                ))),
            }
        })
    }

    fn get_user_data(&self) -> ServiceFuture<'_, UserSession> {
        Box::pin(async move {
            match self.query(&ProviderRequest::GetUserData).await? {
                ProviderResponse::UserData { parcel } => Ok(UserSession::from_parcel(&parcel)?),
                other => Err(TransportError::Protocol(format!(
                    "unexpected reply to get_user_data: {other:?}"
                ))),
            }
        })
    }

    fn close(&self) -> ServiceFuture<'_, ()> {
        Box::pin(async move {
            let mut conn = self.conn.lock().await;
            SinkExt::<String>::close(&mut conn.writer).await?;
            Ok(())
        })
    }
}

/// Binds by opening a socket connection to the provider.
///
/// Also opens signal subscriptions on the same socket.
pub struct SocketConnector {
    socket_path: PathBuf,
    request_timeout: Duration,
}

impl SocketConnector {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Connector for SocketConnector {
    fn connect(&self) -> ServiceFuture<'_, Arc<dyn SessionService>> {
        Box::pin(async move {
            let service =
                SocketSessionService::connect(&self.socket_path, self.request_timeout).await?;
            Ok(Arc::new(service) as Arc<dyn SessionService>)
        })
    }
}

impl SignalSource for SocketConnector {
    fn subscribe(&self, signals: mpsc::Sender<Signal>) -> ServiceFuture<'_, JoinHandle<()>> {
        Box::pin(subscribe(&self.socket_path, signals))
    }
}

/// Open a signal subscription and forward every signal into `tx`, in order.
///
/// Returns once the provider has acknowledged the subscription. The
/// forwarding task ends when either side goes away.
pub async fn subscribe(
    socket_path: &Path,
    tx: mpsc::Sender<Signal>,
) -> Result<JoinHandle<()>, TransportError> {
    let mut conn = ProviderConnection::open(socket_path).await?;
    match conn.request(&ProviderRequest::Subscribe).await? {
        ProviderResponse::Subscribed => {}
        other => {
            return Err(TransportError::Protocol(format!(
                "unexpected reply to subscribe: {other:?}"
            )));
        }
    }
    info!(path = %socket_path.display(), "subscribed to session provider signals");

    Ok(tokio::spawn(async move {
        loop {
            match conn.next_response().await {
                Ok(ProviderResponse::Signal(signal)) => {
                    if tx.send(signal).await.is_err() {
                        debug!("signal receiver dropped, closing subscription");
                        break;
                    }
                }
                Ok(other) => debug!(?other, "ignoring non-signal message on subscription"),
                Err(TransportError::Disconnected) => {
                    info!("session provider closed signal subscription");
                    break;
                }
                Err(e) => {
                    warn!(err = %e, "signal subscription failed");
                    break;
                }
            }
        }
    }))
}
