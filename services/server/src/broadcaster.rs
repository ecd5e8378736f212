//! Fan-out of accepted telemetry events to live observers.
//!
//! Each observer gets a bounded queue.  Publishing never blocks: an
//! observer whose queue is full or whose receiver is gone is dropped from
//! the set, and the remaining observers are unaffected.  There is no
//! buffering or replay — an observer that connects after an event was
//! published never sees it.

use pw_protocol::ObserverEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Events queued per observer before it is considered too slow and dropped.
pub const OBSERVER_QUEUE_DEPTH: usize = 64;

pub type ObserverId = u64;

pub struct Broadcaster {
    observers: Mutex<HashMap<ObserverId, mpsc::Sender<ObserverEvent>>>,
    next_id: AtomicU64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Broadcaster {
            observers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add an observer; the returned receiver yields every event published
    /// while the observer stays in the set.
    pub async fn subscribe(&self) -> (ObserverId, mpsc::Receiver<ObserverEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OBSERVER_QUEUE_DEPTH);
        self.observers.lock().await.insert(id, tx);
        debug!(observer_id = id, "observer subscribed");
        (id, rx)
    }

    pub async fn unsubscribe(&self, id: ObserverId) {
        self.observers.lock().await.remove(&id);
        debug!(observer_id = id, "observer unsubscribed");
    }

    /// Deliver `event` to every observer.  Returns how many received it.
    pub async fn publish(&self, event: ObserverEvent) -> usize {
        let mut observers = self.observers.lock().await;
        let mut delivered = 0;
        let mut dropped = Vec::new();
        for (&id, tx) in observers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(observer_id = id, "observer queue full, dropping observer");
                    dropped.push(id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dropped.push(id);
                }
            }
        }
        for id in dropped {
            observers.remove(&id);
        }
        delivered
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.lock().await.len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
