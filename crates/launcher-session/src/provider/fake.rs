//! In-memory session provider for exercising the broker without a socket.
//!
//! ```ignore
//! let service = Arc::new(FakeSessionService::new());
//! service.set_device(device);
//! let client = ProviderClient::new(Arc::new(FakeConnector::new(service.clone())));
//! client.connect();
//! client.wait_connected(Duration::from_secs(1)).await;
//! assert_eq!(service.device_calls(), 0);
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use launcher_protocol::Signal;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use super::{Connector, ServiceFuture, SessionService, SignalSource};
use crate::error::TransportError;
use crate::model::{DeviceSession, UserSession};

/// Answers device/user queries from records set by the test.
///
/// An unset record answers with a remote error.
#[derive(Default)]
pub struct FakeSessionService {
    device: Mutex<Option<DeviceSession>>,
    user: Mutex<Option<UserSession>>,
    device_calls: AtomicUsize,
    user_calls: AtomicUsize,
    closes: AtomicUsize,
    link_dropped: AtomicBool,
    close_fails: AtomicBool,
}

impl FakeSessionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_device(&self, session: impl Into<Option<DeviceSession>>) {
        *self.device.lock().unwrap_or_else(|e| e.into_inner()) = session.into();
    }

    pub fn set_user(&self, session: impl Into<Option<UserSession>>) {
        *self.user.lock().unwrap_or_else(|e| e.into_inner()) = session.into();
    }

    /// Every later call fails as if the provider process died.
    pub fn drop_link(&self) {
        self.link_dropped.store(true, Ordering::SeqCst);
    }

    pub fn restore_link(&self) {
        self.link_dropped.store(false, Ordering::SeqCst);
    }

    pub fn fail_close(&self) {
        self.close_fails.store(true, Ordering::SeqCst);
    }

    pub fn device_calls(&self) -> usize {
        self.device_calls.load(Ordering::SeqCst)
    }

    pub fn user_calls(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn answer<T: Clone>(&self, slot: &Mutex<Option<T>>, what: &str) -> Result<T, TransportError> {
        if self.link_dropped.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        slot.lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| TransportError::Remote(format!("{what} unavailable")))
    }
}

impl SessionService for FakeSessionService {
    fn get_device_data(&self) -> ServiceFuture<'_, DeviceSession> {
        self.device_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.answer(&self.device, "device session");
        Box::pin(async move { result })
    }

    fn get_user_data(&self) -> ServiceFuture<'_, UserSession> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.answer(&self.user, "user session");
        Box::pin(async move { result })
    }

    fn close(&self) -> ServiceFuture<'_, ()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        let fails = self.close_fails.load(Ordering::SeqCst);
        Box::pin(async move {
            if fails {
                return Err(TransportError::Remote("unbind rejected".to_string()));
            }
            Ok(())
        })
    }
}

/// Hands out a shared [`FakeSessionService`], optionally after a gate opens.
pub struct FakeConnector {
    service: Arc<FakeSessionService>,
    gate: Option<Arc<Notify>>,
    fails: bool,
    connects: AtomicUsize,
}

impl FakeConnector {
    /// Attaches as soon as the connect task runs.
    pub fn new(service: Arc<FakeSessionService>) -> Self {
        Self {
            service,
            gate: None,
            fails: false,
            connects: AtomicUsize::new(0),
        }
    }

    /// Attaches only after [`FakeConnector::gate`] is notified.
    pub fn gated(service: Arc<FakeSessionService>) -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::new(service)
        }
    }

    /// Every bind attempt fails.
    pub fn failing(service: Arc<FakeSessionService>) -> Self {
        Self {
            fails: true,
            ..Self::new(service)
        }
    }

    pub fn gate(&self) -> Arc<Notify> {
        self.gate.clone().unwrap_or_default()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    fn connect(&self) -> ServiceFuture<'_, Arc<dyn SessionService>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fails {
                return Err(TransportError::Io(std::io::Error::from(
                    std::io::ErrorKind::ConnectionRefused,
                )));
            }
            Ok(self.service.clone() as Arc<dyn SessionService>)
        })
    }
}

/// Subscription endpoint driven by the test: it emits signals into the
/// live subscription and can cut it or refuse new ones.
#[derive(Default)]
pub struct FakeSignalSource {
    current: Mutex<Option<mpsc::Sender<Signal>>>,
    cut: Arc<Notify>,
    offline: AtomicBool,
    subscriptions: AtomicUsize,
}

impl FakeSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `signal` on the live subscription. False when there is none.
    pub async fn emit(&self, signal: Signal) -> bool {
        let tx = self.live().clone();
        match tx {
            Some(tx) => tx.send(signal).await.is_ok(),
            None => false,
        }
    }

    /// End the live subscription as if the provider went away.
    pub fn cut(&self) {
        self.live().take();
        self.cut.notify_one();
    }

    /// While offline, new subscriptions are refused.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    fn live(&self) -> MutexGuard<'_, Option<mpsc::Sender<Signal>>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SignalSource for FakeSignalSource {
    fn subscribe(&self, signals: mpsc::Sender<Signal>) -> ServiceFuture<'_, JoinHandle<()>> {
        Box::pin(async move {
            if self.offline.load(Ordering::SeqCst) {
                return Err(TransportError::Io(std::io::Error::from(
                    std::io::ErrorKind::ConnectionRefused,
                )));
            }
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            *self.live() = Some(signals);
            let cut = self.cut.clone();
            Ok(tokio::spawn(async move { cut.notified().await }))
        })
    }
}
