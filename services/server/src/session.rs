//! Per-connection session state machine.
//!
//! One task owns one device connection and drives it through
//! `Open -> Bound -> Closed`.  Every inbound frame runs the same strictly
//! ordered pipeline: decode, verify token, check declared identity, bind in
//! the registry, hand to the persistence sink, broadcast.  Any fault is
//! fatal to this connection only: a best-effort `{error}` notice is
//! written, the transport closes, and the registry entry is released if
//! this session still owns it.
//!
//! A session can also be closed from outside: when the same device binds a
//! newer connection, the registry reports this one as displaced and the
//! new session's task signals the supersede channel, which the select!
//! below observes between reads.

use crate::codec::{decode_frame, FrameCodec};
use crate::registry::{BindOutcome, SessionHandle};
use crate::state::AppState;
use pw_protocol::{ErrorNotice, ObserverEvent};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const READ_CHUNK_BYTES: usize = 4096;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Connection-fatal faults.  None of these is ever process-fatal.
#[derive(Debug)]
pub enum SessionError {
    /// The message did not decode; not retried.
    MalformedFrame(String),
    /// Token absent, malformed, expired, or signature mismatch.
    AuthenticationFailed,
    /// Declared device id disagrees with the authenticated identity.
    IdentityMismatch { declared: String, expected: String },
}

impl SessionError {
    /// Text written to the peer before closing.
    fn notice(&self) -> &'static str {
        match self {
            SessionError::MalformedFrame(_) => "Malformed frame",
            SessionError::AuthenticationFailed => "Authentication failed - Invalid token",
            SessionError::IdentityMismatch { .. } => "Device ID mismatch",
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::MalformedFrame(e) => write!(f, "malformed frame: {}", e),
            SessionError::AuthenticationFailed => write!(f, "authentication failed"),
            SessionError::IdentityMismatch { declared, expected } => {
                write!(f, "device id mismatch: sent {}, expected {}", declared, expected)
            }
        }
    }
}

impl std::error::Error for SessionError {}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum SessionState {
    /// Accepted, no identity bound yet.
    Open,
    /// Identity established; traffic flowing.
    Bound(String),
    /// Terminal.
    Closed,
}

/// Drive one device connection to completion.
pub async fn run_session(stream: TcpStream, peer: SocketAddr, state: AppState) {
    let session_id = Uuid::new_v4();
    let (supersede_tx, mut supersede_rx) = mpsc::channel::<()>(1);
    let handle = SessionHandle::new(session_id, supersede_tx);
    info!(peer = %peer, session_id = %session_id, "device connected");

    let (mut reader, mut writer) = stream.into_split();
    let mut codec = FrameCodec::new();
    let mut session = SessionState::Open;
    let mut buf = vec![0u8; READ_CHUNK_BYTES];

    'conn: loop {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    debug!(peer = %peer, "transport closed by peer");
                    break 'conn;
                }
                Ok(n) => {
                    let messages = match codec.push(&buf[..n]) {
                        Ok(messages) => messages,
                        Err(e) => {
                            warn!(peer = %peer, error = %e, "frame buffer overflow");
                            send_notice(&mut writer, "Frame too large").await;
                            break 'conn;
                        }
                    };
                    for text in messages {
                        if let Err(fault) = process_frame(&text, &handle, &mut session, &state).await {
                            warn!(peer = %peer, error = %fault, "closing session");
                            send_notice(&mut writer, fault.notice()).await;
                            break 'conn;
                        }
                    }
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "transport error");
                    break 'conn;
                }
            },
            _ = supersede_rx.recv() => {
                info!(peer = %peer, session_id = %session_id, "superseded by a newer session");
                send_notice(&mut writer, "Session superseded by a newer connection").await;
                break 'conn;
            }
        }
    }

    let closed = std::mem::replace(&mut session, SessionState::Closed);
    if let SessionState::Bound(identity) = closed {
        // Guarded by session id: a displaced session cannot evict the
        // entry its successor now owns.
        state.registry.release(&identity, session_id).await;
    }
    let _ = writer.shutdown().await;
    info!(peer = %peer, session_id = %session_id, "session closed");
}

/// Run one decoded message through the frame pipeline.
async fn process_frame(
    text: &str,
    handle: &SessionHandle,
    session: &mut SessionState,
    state: &AppState,
) -> Result<(), SessionError> {
    let frame = decode_frame(text).map_err(|e| SessionError::MalformedFrame(e.to_string()))?;
    let claims = frame
        .token
        .as_deref()
        .and_then(|token| state.verifier.verify(token))
        .ok_or(SessionError::AuthenticationFailed)?;
    if frame.device_id != claims.device_id {
        return Err(SessionError::IdentityMismatch {
            declared: frame.device_id,
            expected: claims.device_id,
        });
    }
    // The identity is fixed for the life of a session once bound; letting
    // it change would leave two registry entries pointing at one session.
    if let SessionState::Bound(bound) = &*session {
        if *bound != frame.device_id {
            return Err(SessionError::IdentityMismatch {
                declared: frame.device_id.clone(),
                expected: bound.clone(),
            });
        }
    }

    match state.registry.bind(&claims.device_id, handle).await {
        BindOutcome::Bound => {
            info!(device_id = %claims.device_id, session_id = %handle.session_id(), "device bound");
            *session = SessionState::Bound(claims.device_id.clone());
        }
        BindOutcome::AlreadyBound => {}
        BindOutcome::Superseded(displaced) => {
            info!(
                device_id = %claims.device_id,
                displaced_session = %displaced.session_id(),
                "new connection supersedes stale session"
            );
            displaced.notify_superseded().await;
            *session = SessionState::Bound(claims.device_id.clone());
        }
    }

    // Sink and broadcaster are independent best-effort consumers: a failed
    // persistence write must not keep the frame from observers.
    if let Err(e) = state.sink.save(&frame.device_id, &frame.payload).await {
        warn!(device_id = %frame.device_id, error = %e, "telemetry sink failure");
    }
    let event = ObserverEvent {
        device_id: frame.device_id.clone(),
        device_name: frame
            .device_name
            .clone()
            .unwrap_or_else(|| frame.device_id.clone()),
        data: frame.payload,
    };
    state.broadcaster.publish(event).await;
    debug!(device_id = %frame.device_id, "frame accepted");
    Ok(())
}

async fn send_notice(writer: &mut OwnedWriteHalf, message: &str) {
    if let Ok(json) = serde_json::to_string(&ErrorNotice::new(message)) {
        let _ = writer.write_all(json.as_bytes()).await;
    }
}
