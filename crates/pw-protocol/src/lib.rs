// pw-protocol: Telemetry wire types and serialization.
//
// Two transports share these types: devices speak newline-delimited JSON
// over raw TCP, observers receive self-delimited JSON text messages over
// WebSocket.  Framing is owned by the server's codec; nothing here assumes
// a delimiter.

use serde::{Deserialize, Serialize};

/// One inbound telemetry frame (device -> server).
///
/// The payload is opaque to the relay: it is persisted and re-broadcast
/// as-is, never interpreted.  `token` is optional at the decode layer so
/// that a frame without one fails authentication rather than parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFrame {
    pub device_id: String,
    /// Human-readable name; falls back to `device_id` in broadcasts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// Signed credential, presented on every frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Opaque telemetry fields (cpu, ram, temp, battery, uptime, ...).
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// One broadcast event (server -> observer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverEvent {
    pub device_id: String,
    pub device_name: String,
    pub data: serde_json::Value,
}

/// Failure notice written to a device before its transport is closed.
///
/// This is the only server -> device message; the happy path is silent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub error: String,
}

impl ErrorNotice {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorNotice {
            error: error.into(),
        }
    }
}
