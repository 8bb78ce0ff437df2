//! Per-process cache of the device and user sessions.
//!
//! Trust-on-read: a cached record is returned as-is until invalidated. An
//! absent slot triggers one fetch on the next read; only records that pass
//! the validity rule are stored.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::listener::Invalidate;
use crate::model::{DeviceSession, DeviceSessionData, UserSession, UserSessionData};
use crate::parcel::Parcelable;
use crate::provider::ProviderClient;

/// Source of fresh session records.
pub trait SessionFetcher: Send + Sync {
    fn fetch_device(&self) -> impl Future<Output = Option<DeviceSession>> + Send;

    fn fetch_user(&self) -> impl Future<Output = Option<UserSession>> + Send;
}

impl SessionFetcher for ProviderClient {
    async fn fetch_device(&self) -> Option<DeviceSession> {
        ProviderClient::fetch_device(self).await
    }

    async fn fetch_user(&self) -> Option<UserSession> {
        ProviderClient::fetch_user(self).await
    }
}

/// Session records handed to the process at launch.
#[derive(Debug, Clone, Default)]
pub struct StartupSnapshot {
    pub device: Option<DeviceSession>,
    pub user: Option<UserSession>,
}

impl StartupSnapshot {
    /// Decode parcel-encoded records. Malformed ones are dropped with a warning.
    pub fn from_parcels(device: Option<&[u8]>, user: Option<&[u8]>) -> Self {
        let device = device.and_then(|bytes| match DeviceSession::from_parcel(bytes) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(err = %e, "ignoring malformed device session from launch request");
                None
            }
        });
        let user = user.and_then(|bytes| match UserSession::from_parcel(bytes) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(err = %e, "ignoring malformed user session from launch request");
                None
            }
        });
        Self { device, user }
    }
}

#[derive(Default)]
struct Slots {
    device: Option<DeviceSessionData>,
    user: Option<UserSessionData>,
}

/// Holds at most one device and one user session.
///
/// `get_device`/`get_user` are serialized against each other. `invalidate`
/// only takes the slot lock, so it may land while a fetch is in flight; that
/// fetch still stores its result afterwards.
pub struct SessionCache<F> {
    fetcher: F,
    op_lock: tokio::sync::Mutex<()>,
    slots: Mutex<Slots>,
}

impl<F: SessionFetcher> SessionCache<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            op_lock: tokio::sync::Mutex::new(()),
            slots: Mutex::new(Slots::default()),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Populate slots from launch-time records, without a remote round trip.
    pub fn seed(&self, snapshot: StartupSnapshot) {
        let mut slots = self.slots();
        match snapshot.device.map(DeviceSession::into_valid) {
            Some(Some(device)) => {
                info!("device session provided at launch, caching it");
                slots.device = Some(device);
            }
            Some(None) => warn!("device session provided at launch is not valid, ignoring it"),
            None => warn!("device session not provided at launch"),
        }
        match snapshot.user.map(UserSession::into_valid) {
            Some(Some(user)) => {
                info!("user session provided at launch, caching it");
                slots.user = Some(user);
            }
            Some(None) => info!("user session provided at launch is not valid, ignoring it"),
            None => info!("user session not provided at launch"),
        }
    }

    pub async fn get_device(&self) -> Option<DeviceSessionData> {
        let _op = self.op_lock.lock().await;
        if let Some(device) = self.peek_device() {
            return Some(device);
        }

        let fetched = self.fetcher.fetch_device().await;
        let valid = fetched.and_then(|session| {
            let valid = session.into_valid();
            if valid.is_none() {
                warn!("device session from provider failed validation");
            }
            valid
        });
        self.slots().device = valid.clone();
        valid
    }

    pub async fn get_user(&self) -> Option<UserSessionData> {
        let _op = self.op_lock.lock().await;
        if let Some(user) = self.peek_user() {
            return Some(user);
        }

        let fetched = self.fetcher.fetch_user().await;
        let valid = fetched.and_then(|session| {
            let valid = session.into_valid();
            if valid.is_none() {
                debug!("user session from provider is empty or invalid");
            }
            valid
        });
        self.slots().user = valid.clone();
        valid
    }

    /// The cached device session, without fetching.
    pub fn peek_device(&self) -> Option<DeviceSessionData> {
        self.slots().device.clone()
    }

    /// The cached user session, without fetching.
    pub fn peek_user(&self) -> Option<UserSessionData> {
        self.slots().user.clone()
    }

    /// Clear both slots. Never fetches.
    pub fn invalidate(&self) {
        let mut slots = self.slots();
        slots.device = None;
        slots.user = None;
    }
}

impl<F: SessionFetcher> Invalidate for SessionCache<F> {
    fn invalidate(&self) {
        SessionCache::invalidate(self);
    }
}
