//! Persistence boundary.
//!
//! Long-term telemetry storage is an external collaborator: sessions hand
//! each accepted frame to a [`TelemetrySink`] and move on.  A sink failure
//! is logged by the caller and swallowed — it never affects the registry
//! or the broadcast path.

use futures_util::future::BoxFuture;
use tracing::debug;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum SinkError {
    /// The backing store rejected or failed the write.
    WriteFailed(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::WriteFailed(s) => write!(f, "sink write failed: {}", s),
        }
    }
}

impl std::error::Error for SinkError {}

// ---------------------------------------------------------------------------
// TelemetrySink
// ---------------------------------------------------------------------------

/// Fire-and-forget storage for accepted telemetry.
pub trait TelemetrySink: Send + Sync {
    /// Persist one frame's fields for `identity`.
    fn save<'a>(
        &'a self,
        identity: &'a str,
        fields: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<(), SinkError>>;
}

/// Sink for deployments without a wired store: logs and drops.
pub struct DiscardSink;

impl TelemetrySink for DiscardSink {
    fn save<'a>(
        &'a self,
        identity: &'a str,
        _fields: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(async move {
            debug!(device_id = %identity, "telemetry discarded (no sink configured)");
            Ok(())
        })
    }
}
