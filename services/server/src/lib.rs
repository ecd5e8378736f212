pub mod auth;
pub mod broadcaster;
pub mod codec;
pub mod gateway;
pub mod http;
pub mod registry;
pub mod session;
pub mod sink;
pub mod state;
pub mod ws_observer;

pub use state::AppState;

use axum::{routing::get, Router};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/v1/observers", get(ws_observer::ws_observer_handler))
        .route("/api/v1/devices/active", get(http::list_active_devices))
        .route("/healthz", get(health::healthz))
        .with_state(state)
}

mod health {
    use axum::response::IntoResponse;
    pub async fn healthz() -> impl IntoResponse {
        "ok"
    }
}
