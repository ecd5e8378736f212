//! Read-only HTTP surface over the registry.

use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};

/// `GET /api/v1/devices/active` — identities with a live session.
pub async fn list_active_devices(State(state): State<AppState>) -> impl IntoResponse {
    let mut devices = state.registry.active_devices().await;
    devices.sort();
    Json(serde_json::json!({
        "success": true,
        "count": devices.len(),
        "devices": devices,
    }))
}
