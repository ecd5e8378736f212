use crate::auth::TokenVerifier;
use crate::broadcaster::Broadcaster;
use crate::registry::DeviceRegistry;
use crate::sink::TelemetrySink;
use std::sync::Arc;

/// Process-wide shared state: created once at startup, cloned into every
/// connection task and request handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub broadcaster: Arc<Broadcaster>,
    pub sink: Arc<dyn TelemetrySink>,
    pub verifier: TokenVerifier,
}

impl AppState {
    pub fn new(token_secret: &str, sink: Arc<dyn TelemetrySink>) -> Self {
        AppState {
            registry: Arc::new(DeviceRegistry::new()),
            broadcaster: Arc::new(Broadcaster::new()),
            sink,
            verifier: TokenVerifier::new(token_secret),
        }
    }
}
