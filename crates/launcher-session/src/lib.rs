pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod listener;
pub mod model;
pub mod parcel;
pub mod projector;
pub mod provider;

pub use broker::SessionBroker;
pub use cache::{SessionCache, SessionFetcher, StartupSnapshot};
pub use config::BrokerConfig;
pub use error::{BrokerError, ProjectionError, TransportError};
pub use listener::{Invalidate, NotificationListener, Terminator};
pub use model::{DeviceSession, DeviceSessionData, UserSession, UserSessionData};
pub use parcel::{ParcelError, Parcelable};
pub use projector::{ProjectorConfig, SessionProjector, ViewSettings};
pub use provider::{ConnectionState, Connector, ProviderClient, SessionService, SignalSource};
