//! Client side of the link to the out-of-process session provider.
//!
//! The link is a small state machine:
//!
//! ```text
//! Disconnected --connect()--> Connecting --attached--> Connected
//!      ^                          |                        |
//!      +------ bind failed -------+------ detached --------+
//!      +------------------- disconnect() ------------------+
//! ```
//!
//! Fetches are only attempted while `Connected`; in every other state they
//! yield `None` without touching the transport.

pub mod fake;
pub mod socket;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use launcher_protocol::Signal;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::TransportError;
use crate::model::{DeviceSession, UserSession};

pub type ServiceFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Query operations exposed by a bound session provider.
pub trait SessionService: Send + Sync {
    fn get_device_data(&self) -> ServiceFuture<'_, DeviceSession>;

    fn get_user_data(&self) -> ServiceFuture<'_, UserSession>;

    /// Release the underlying link.
    fn close(&self) -> ServiceFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

/// Binds to the session provider. Completion of the future is the "attached" event.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> ServiceFuture<'_, Arc<dyn SessionService>>;
}

/// Opens signal subscriptions on the provider.
///
/// The returned task forwards signals into `signals` and finishes when the
/// subscription is lost.
pub trait SignalSource: Send + Sync + 'static {
    fn subscribe(&self, signals: mpsc::Sender<Signal>) -> ServiceFuture<'_, JoinHandle<()>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

enum Link {
    Disconnected,
    Connecting {
        attempt: u64,
    },
    Connected {
        attempt: u64,
        service: Arc<dyn SessionService>,
    },
}

impl Link {
    fn state(&self) -> ConnectionState {
        match self {
            Link::Disconnected => ConnectionState::Disconnected,
            Link::Connecting { .. } => ConnectionState::Connecting,
            Link::Connected { .. } => ConnectionState::Connected,
        }
    }
}

struct Inner {
    connector: Arc<dyn Connector>,
    link: Mutex<Link>,
    next_attempt: AtomicU64,
    state_tx: watch::Sender<ConnectionState>,
}

impl Inner {
    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, link: &mut Link, next: Link) {
        let from = link.state();
        *link = next;
        let to = link.state();
        if from != to {
            debug!(%from, %to, "session provider link transition");
        }
        self.state_tx.send_replace(to);
    }
}

/// Owns the connection handle to the session provider.
///
/// Cheap to clone; clones share one link.
#[derive(Clone)]
pub struct ProviderClient {
    inner: Arc<Inner>,
}

impl ProviderClient {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                connector,
                link: Mutex::new(Link::Disconnected),
                next_attempt: AtomicU64::new(0),
                state_tx,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.link().state()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Start binding to the provider.
    ///
    /// Returns whether an attempt is under way (or already complete), not
    /// whether the provider is reachable. The outcome arrives later as an
    /// attached or detached transition.
    pub fn connect(&self) -> bool {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            error!("no async runtime available to bind the session provider");
            return false;
        };

        let attempt = {
            let mut link = self.inner.link();
            if !matches!(*link, Link::Disconnected) {
                return true;
            }
            let attempt = self.inner.next_attempt.fetch_add(1, Ordering::Relaxed) + 1;
            self.inner.transition(&mut link, Link::Connecting { attempt });
            attempt
        };

        let client = self.clone();
        handle.spawn(async move {
            match client.inner.connector.connect().await {
                Ok(service) => client.attached(attempt, service),
                Err(e) => {
                    error!(err = %e, "failed to bind session provider");
                    client.bind_failed(attempt);
                }
            }
        });
        true
    }

    fn attached(&self, attempt: u64, service: Arc<dyn SessionService>) {
        let mut link = self.inner.link();
        match *link {
            Link::Connecting { attempt: current } if current == attempt => {
                self.inner
                    .transition(&mut link, Link::Connected { attempt, service });
                info!("session provider attached");
            }
            _ => warn!(attempt, "discarding stale session provider attachment"),
        }
    }

    fn bind_failed(&self, attempt: u64) {
        let mut link = self.inner.link();
        if matches!(*link, Link::Connecting { attempt: current } if current == attempt) {
            self.inner.transition(&mut link, Link::Disconnected);
        }
    }

    /// The provider went away underneath us.
    pub fn detached(&self) {
        let mut link = self.inner.link();
        if !matches!(*link, Link::Disconnected) {
            self.inner.transition(&mut link, Link::Disconnected);
            warn!("session provider detached");
        }
    }

    fn detached_if_current(&self, attempt: u64) {
        let mut link = self.inner.link();
        if matches!(*link, Link::Connected { attempt: current, .. } if current == attempt) {
            self.inner.transition(&mut link, Link::Disconnected);
            warn!("session provider detached");
        }
    }

    /// Release the link unconditionally. Close failures are logged, never returned.
    pub async fn disconnect(&self) {
        let previous = {
            let mut link = self.inner.link();
            let previous = std::mem::replace(&mut *link, Link::Disconnected);
            self.inner.state_tx.send_replace(ConnectionState::Disconnected);
            previous
        };
        if let Link::Connected { service, .. } = previous {
            if let Err(e) = service.close().await {
                error!(err = %e, "error while releasing session provider link");
            }
            info!("session provider link released");
        }
    }

    /// Wait up to `grace` for the link to reach `Connected`.
    ///
    /// Best effort: returns whether it did. Fetches issued before then
    /// simply come back empty.
    pub async fn wait_connected(&self, grace: Duration) -> bool {
        let mut rx = self.inner.state_tx.subscribe();
        let connected = tokio::time::timeout(
            grace,
            rx.wait_for(|state| *state == ConnectionState::Connected),
        )
        .await;
        matches!(connected, Ok(Ok(_)))
    }

    fn service(&self) -> Option<(u64, Arc<dyn SessionService>)> {
        match &*self.inner.link() {
            Link::Connected { attempt, service } => Some((*attempt, service.clone())),
            _ => None,
        }
    }

    /// Single best-effort fetch of the device session.
    pub async fn fetch_device(&self) -> Option<DeviceSession> {
        let Some((attempt, service)) = self.service() else {
            error!("device session requested while session provider not connected");
            return None;
        };
        match service.get_device_data().await {
            Ok(session) => Some(session),
            Err(e) => {
                error!(err = %e, "failed to retrieve device session from provider");
                if e.is_link_lost() {
                    self.detached_if_current(attempt);
                }
                None
            }
        }
    }

    /// Single best-effort fetch of the user session.
    pub async fn fetch_user(&self) -> Option<UserSession> {
        let Some((attempt, service)) = self.service() else {
            error!("user session requested while session provider not connected");
            return None;
        };
        match service.get_user_data().await {
            Ok(session) => Some(session),
            Err(e) => {
                error!(err = %e, "failed to retrieve user session from provider");
                if e.is_link_lost() {
                    self.detached_if_current(attempt);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeConnector, FakeSessionService};
    use super::*;
    use crate::model::DeviceSessionData;

    fn device() -> DeviceSession {
        DeviceSession::from(DeviceSessionData {
            store_number: Some("121".into()),
            device_id: Some("dev-1".into()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn fetch_while_disconnected_skips_the_remote_call() {
        let service = Arc::new(FakeSessionService::new());
        service.set_device(device());
        let client = ProviderClient::new(Arc::new(FakeConnector::new(service.clone())));

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.fetch_device().await.is_none());
        assert!(client.fetch_user().await.is_none());
        assert_eq!(service.device_calls(), 0);
        assert_eq!(service.user_calls(), 0);
    }

    #[tokio::test]
    async fn connect_attaches_asynchronously() {
        let service = Arc::new(FakeSessionService::new());
        service.set_device(device());
        let connector = FakeConnector::gated(service.clone());
        let gate = connector.gate();
        let client = ProviderClient::new(Arc::new(connector));

        assert!(client.connect());
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert!(client.fetch_device().await.is_none());
        assert_eq!(service.device_calls(), 0);

        gate.notify_one();
        assert!(client.wait_connected(Duration::from_secs(1)).await);
        assert_eq!(client.fetch_device().await, Some(device()));
        assert_eq!(service.device_calls(), 1);
    }

    #[tokio::test]
    async fn repeated_connect_reuses_the_attempt() {
        let service = Arc::new(FakeSessionService::new());
        let connector = Arc::new(FakeConnector::new(service));
        let client = ProviderClient::new(connector.clone());

        assert!(client.connect());
        assert!(client.wait_connected(Duration::from_secs(1)).await);
        assert!(client.connect());
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn wait_connected_gives_up_after_grace() {
        let service = Arc::new(FakeSessionService::new());
        let client = ProviderClient::new(Arc::new(FakeConnector::gated(service)));
        assert!(client.connect());
        assert!(!client.wait_connected(Duration::from_millis(20)).await);
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn bind_failure_returns_to_disconnected() {
        let service = Arc::new(FakeSessionService::new());
        let client = ProviderClient::new(Arc::new(FakeConnector::failing(service)));
        assert!(client.connect());
        for _ in 0..50 {
            if client.state() == ConnectionState::Disconnected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn remote_error_yields_none_but_keeps_link() {
        let service = Arc::new(FakeSessionService::new());
        let client = ProviderClient::new(Arc::new(FakeConnector::new(service.clone())));
        client.connect();
        assert!(client.wait_connected(Duration::from_secs(1)).await);

        // No device configured: the fake answers with a remote error.
        assert!(client.fetch_device().await.is_none());
        assert_eq!(service.device_calls(), 1);
        assert_eq!(client.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn lost_link_during_fetch_detaches() {
        let service = Arc::new(FakeSessionService::new());
        service.set_device(device());
        let client = ProviderClient::new(Arc::new(FakeConnector::new(service.clone())));
        client.connect();
        assert!(client.wait_connected(Duration::from_secs(1)).await);

        service.drop_link();
        assert!(client.fetch_device().await.is_none());
        assert_eq!(client.state(), ConnectionState::Disconnected);

        // Further fetches short-circuit.
        assert!(client.fetch_device().await.is_none());
        assert_eq!(service.device_calls(), 1);
    }

    #[tokio::test]
    async fn disconnect_releases_and_discards_late_attach() {
        let service = Arc::new(FakeSessionService::new());
        let connector = FakeConnector::gated(service.clone());
        let gate = connector.gate();
        let client = ProviderClient::new(Arc::new(connector));

        client.connect();
        client.disconnect().await;
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_swallows_close_errors() {
        let service = Arc::new(FakeSessionService::new());
        service.fail_close();
        let client = ProviderClient::new(Arc::new(FakeConnector::new(service.clone())));
        client.connect();
        assert!(client.wait_connected(Duration::from_secs(1)).await);

        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(service.closes(), 1);
    }

    #[tokio::test]
    async fn detached_event_blocks_fetches_until_reconnect() {
        let service = Arc::new(FakeSessionService::new());
        service.set_device(device());
        let client = ProviderClient::new(Arc::new(FakeConnector::new(service.clone())));
        client.connect();
        assert!(client.wait_connected(Duration::from_secs(1)).await);

        client.detached();
        assert!(client.fetch_device().await.is_none());
        assert_eq!(service.device_calls(), 0);

        client.connect();
        assert!(client.wait_connected(Duration::from_secs(1)).await);
        assert!(client.fetch_device().await.is_some());
    }

    #[test]
    fn connect_without_runtime_reports_failure() {
        let service = Arc::new(FakeSessionService::new());
        let client = ProviderClient::new(Arc::new(FakeConnector::new(service)));
        assert!(!client.connect());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
