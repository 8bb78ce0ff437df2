pub mod paths;

use serde::{Deserialize, Serialize};

/// Version of the provider protocol spoken by this crate.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum size of a JSON-lines frame on either socket (64 KiB).
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Which session record a message refers to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Device,
    User,
}

// ---------------------------------------------------------------------------
// Broker <-> session provider
// ---------------------------------------------------------------------------

/// Requests sent by the broker to the session provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ProviderRequest {
    GetDeviceData,
    GetUserData,
    /// Turn this connection into a signal stream.
    Subscribe,
}

/// Messages sent by the session provider to the broker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderResponse {
    /// First line on every connection.
    Hello { protocol_version: u32 },
    /// Parcel-encoded device session.
    DeviceData {
        #[serde(with = "base64_bytes")]
        parcel: Vec<u8>,
    },
    /// Parcel-encoded user session.
    UserData {
        #[serde(with = "base64_bytes")]
        parcel: Vec<u8>,
    },
    /// Acknowledges a subscription.
    Subscribed,
    Error { message: String },
    Signal(Signal),
}

/// Out-of-band notifications broadcast by the provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    /// A device or user session changed. The kind is informational only.
    SessionChanged {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<SessionKind>,
    },
    /// The hosting application should exit.
    ShutdownRequested,
}

// ---------------------------------------------------------------------------
// Command surface (application <-> launcher node)
// ---------------------------------------------------------------------------

/// Named actions routed to the broker.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    #[serde(alias = "getDevice")]
    GetDevice,
    #[serde(alias = "getUser")]
    GetUser,
    #[serde(alias = "getSettings")]
    GetSettings,
}

/// Responses written by the launcher node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandResponse {
    Hello { version: String },
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    Error { code: ErrorCode, message: String },
}

/// Error codes for structured error handling on the command surface.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The action name is not routed by this node.
    InvalidAction,
    /// The line was not valid JSON.
    InvalidRequest,
    /// No valid session of the requested kind could be obtained.
    SessionUnavailable,
    /// Settings were requested but no device session could be obtained.
    DeviceUnavailable,
    ServerError,
}

/// Base64 encoding for byte arrays in JSON.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
