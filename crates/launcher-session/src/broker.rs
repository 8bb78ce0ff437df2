//! Facade the host process talks to.
//!
//! Startup order: seed from the launch snapshot, begin the provider bind,
//! open the signal subscription, then wait a bounded grace period for the
//! bind. Requests served before the bind lands fall back to cached data or
//! come back empty.
//!
//! After startup a supervisor task keeps the subscription and the bind
//! alive. Losing the subscription drops both cached sessions, since signals
//! may have been missed, and the link is rebuilt once the provider accepts
//! connections again.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use launcher_protocol::Signal;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{SessionCache, StartupSnapshot};
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::listener::{NotificationListener, Terminator};
use crate::model::{DeviceSessionData, UserSessionData};
use crate::projector::{SessionProjector, ViewSettings};
use crate::provider::socket::SocketConnector;
use crate::provider::{ConnectionState, Connector, ProviderClient, SignalSource};

pub struct SessionBroker {
    provider: ProviderClient,
    cache: Arc<SessionCache<ProviderClient>>,
    projector: SessionProjector,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionBroker {
    pub fn new(connector: Arc<dyn Connector>, projector: SessionProjector) -> Self {
        let provider = ProviderClient::new(connector);
        Self {
            cache: Arc::new(SessionCache::new(provider.clone())),
            provider,
            projector,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Bring up a broker against the provider socket named in `config`.
    pub async fn start(
        config: &BrokerConfig,
        snapshot: StartupSnapshot,
        terminator: Arc<dyn Terminator>,
    ) -> Arc<Self> {
        let connector = Arc::new(
            SocketConnector::new(config.provider_socket.clone())
                .with_request_timeout(config.request_timeout()),
        );
        let broker = Arc::new(Self::new(
            connector.clone(),
            SessionProjector::new(config.projector.clone()),
        ));
        broker.cache.seed(snapshot);

        if !broker.provider.connect() {
            warn!("unable to start session provider bind");
        }

        let (tx, rx) = mpsc::channel(config.signal_buffer.max(1));
        broker.listen(rx, terminator);
        broker
            .supervise(connector, tx, config.reconnect_interval())
            .await;

        if broker.provider.wait_connected(config.connect_grace()).await {
            info!("session provider bound");
        } else {
            warn!(
                state = %broker.provider.state(),
                "session provider not bound after grace period, serving anyway"
            );
        }
        broker
    }

    /// Route `signals` into a listener that invalidates this broker's cache.
    pub fn listen(&self, signals: mpsc::Receiver<Signal>, terminator: Arc<dyn Terminator>) {
        let listener = NotificationListener::new(self.cache.clone(), terminator);
        self.track(listener.spawn(signals));
    }

    /// Subscribe to `source` and keep the subscription and the provider
    /// bind alive until shutdown, retrying every `retry`.
    pub async fn supervise(
        &self,
        source: Arc<dyn SignalSource>,
        signals: mpsc::Sender<Signal>,
        retry: Duration,
    ) {
        let subscription = match source.subscribe(signals.clone()).await {
            Ok(task) => Some(Subscription(task)),
            Err(e) => {
                warn!(err = %e, "session signals unavailable, retrying in the background");
                None
            }
        };
        let supervisor = LinkSupervisor {
            provider: self.provider.clone(),
            cache: self.cache.clone(),
            source,
            signals,
            retry,
        };
        self.track(tokio::spawn(supervisor.run(subscription)));
    }

    fn track(&self, task: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(task);
    }

    pub fn provider(&self) -> &ProviderClient {
        &self.provider
    }

    pub fn cache(&self) -> &SessionCache<ProviderClient> {
        &self.cache
    }

    pub fn projector(&self) -> &SessionProjector {
        &self.projector
    }

    pub async fn get_device(&self) -> Result<DeviceSessionData, BrokerError> {
        self.cache
            .get_device()
            .await
            .ok_or(BrokerError::DeviceUnavailable)
    }

    /// Fails with [`BrokerError::UserUnavailable`] when nobody is logged in.
    pub async fn get_user(&self) -> Result<UserSessionData, BrokerError> {
        self.cache
            .get_user()
            .await
            .ok_or(BrokerError::UserUnavailable)
    }

    pub async fn get_settings(&self) -> Result<ViewSettings, BrokerError> {
        let user = self.cache.get_user().await;
        let device = self.cache.get_device().await;
        Ok(self.projector.project(user.as_ref(), device.as_ref())?)
    }

    pub async fn device_view(&self) -> Result<Map<String, Value>, BrokerError> {
        let device = self.get_device().await?;
        Ok(self.projector.device_view(&device))
    }

    pub async fn user_view(&self) -> Result<Map<String, Value>, BrokerError> {
        let user = self.get_user().await?;
        Ok(self.projector.user_view(&user))
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Stop signal handling and release the provider binding.
    pub async fn shutdown(&self) {
        let tasks = std::mem::take(
            &mut *self
                .tasks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for task in tasks {
            task.abort();
        }
        self.provider.disconnect().await;
        info!("session broker stopped");
    }
}

/// Aborts the forwarding task when the supervisor lets go of it.
struct Subscription(JoinHandle<()>);

impl Drop for Subscription {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct LinkSupervisor {
    provider: ProviderClient,
    cache: Arc<SessionCache<ProviderClient>>,
    source: Arc<dyn SignalSource>,
    signals: mpsc::Sender<Signal>,
    retry: Duration,
}

impl LinkSupervisor {
    async fn run(self, mut subscription: Option<Subscription>) {
        let mut state = self.provider.state_changes();
        loop {
            if let Some(live) = subscription.take() {
                self.hold(live, &mut state).await;
                warn!("session provider signals lost, dropping cached sessions");
                self.cache.invalidate();
                self.provider.disconnect().await;
            }

            tokio::time::sleep(self.retry).await;
            match self.source.subscribe(self.signals.clone()).await {
                Ok(task) => {
                    info!("session provider signals restored");
                    subscription = Some(Subscription(task));
                    self.provider.connect();
                }
                Err(e) => debug!(err = %e, "session provider still unavailable"),
            }
        }
    }

    /// Wait for the subscription to end, rebinding the query link whenever
    /// it drops in the meantime.
    async fn hold(&self, mut live: Subscription, state: &mut watch::Receiver<ConnectionState>) {
        loop {
            tokio::select! {
                _ = &mut live.0 => return,
                changed = state.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let lost = *state.borrow_and_update() == ConnectionState::Disconnected;
                    if lost {
                        tokio::time::sleep(self.retry).await;
                        self.provider.connect();
                    }
                }
            }
        }
    }
}
