use std::time::Duration;

use launcher_protocol::ErrorCode;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

use crate::parcel::ParcelError;

/// Failure of a single call to the session provider.
///
/// The cache absorbs all of these; callers only ever see an absent session.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("session provider disconnected")]
    Disconnected,

    #[error("session provider error: {0}")]
    Remote(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("session provider did not answer within {0:?}")]
    TimedOut(Duration),

    #[error("parcel decode failed: {0}")]
    Parcel(#[from] ParcelError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the provider link itself is gone, as opposed to a single bad call.
    pub fn is_link_lost(&self) -> bool {
        match self {
            // A late answer would be read as the reply to the next request.
            TransportError::Disconnected | TransportError::TimedOut(_) => true,
            TransportError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

impl From<LinesCodecError> for TransportError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::Io(e) => TransportError::Io(e),
            LinesCodecError::MaxLineLengthExceeded => {
                TransportError::Protocol("frame exceeds maximum line length".to_string())
            }
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Protocol(format!("invalid json: {err}"))
    }
}

/// The settings view cannot be produced.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("device session unavailable: store context cannot be derived")]
    DeviceUnavailable,
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("no valid device session available")]
    DeviceUnavailable,

    #[error("no valid user session available")]
    UserUnavailable,

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl BrokerError {
    /// Convert to protocol error code and sanitized message.
    pub fn to_error_code(&self) -> (ErrorCode, String) {
        match self {
            BrokerError::DeviceUnavailable | BrokerError::UserUnavailable => {
                (ErrorCode::SessionUnavailable, self.to_string())
            }
            BrokerError::Projection(_) => (ErrorCode::DeviceUnavailable, self.to_string()),
        }
    }
}
