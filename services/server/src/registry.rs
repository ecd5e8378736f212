//! Device registry: identity -> live session arbitration.
//!
//! At most one live session may be bound to a device identity.  A device
//! that reconnects before its old socket is reaped wins: the new session
//! takes the entry and the caller force-closes the one it displaced.
//!
//! All mutation goes through a single async mutex; every operation is O(1)
//! map work, so contention stays negligible.

use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Handle to a live session, held by the registry while bound.
///
/// `supersede_tx` reaches the session's select! loop; sending on it forces
/// the session to close with a supersede notice.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: Uuid,
    supersede_tx: mpsc::Sender<()>,
}

impl SessionHandle {
    pub fn new(session_id: Uuid, supersede_tx: mpsc::Sender<()>) -> Self {
        SessionHandle {
            session_id,
            supersede_tx,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Tell the session it has been displaced.  Best-effort: the session
    /// may already be tearing down on its own.
    pub async fn notify_superseded(&self) {
        let _ = self.supersede_tx.send(()).await;
    }
}

/// Outcome of a bind attempt.
#[derive(Debug)]
pub enum BindOutcome {
    /// The identity had no live session; this session now owns it.
    Bound,
    /// The identity was already bound to this same session.  No churn.
    AlreadyBound,
    /// A different session held the identity; it has been replaced and the
    /// caller must force-close it.
    Superseded(SessionHandle),
}

pub struct DeviceRegistry {
    entries: Mutex<HashMap<String, SessionHandle>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        DeviceRegistry {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Bind `identity` to the session behind `handle`.
    pub async fn bind(&self, identity: &str, handle: &SessionHandle) -> BindOutcome {
        let mut entries = self.entries.lock().await;
        match entries.get(identity).map(SessionHandle::session_id) {
            Some(current) if current == handle.session_id() => BindOutcome::AlreadyBound,
            Some(_) => {
                let displaced = entries
                    .insert(identity.to_owned(), handle.clone())
                    .expect("entry observed under the same lock");
                BindOutcome::Superseded(displaced)
            }
            None => {
                entries.insert(identity.to_owned(), handle.clone());
                BindOutcome::Bound
            }
        }
    }

    /// Remove the entry for `identity`, but only if it still points at
    /// `session_id`.  A stale close event racing a newer bind must not
    /// evict the new session's entry.
    pub async fn release(&self, identity: &str, session_id: Uuid) -> bool {
        let mut entries = self.entries.lock().await;
        let owns_entry = entries.get(identity).map(SessionHandle::session_id) == Some(session_id);
        if owns_entry {
            entries.remove(identity);
        }
        owns_entry
    }

    /// Identities with a live session, unordered.
    pub async fn active_devices(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
