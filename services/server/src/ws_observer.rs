//! Observer WebSocket endpoint.
//!
//! Observers subscribe to the live broadcast and receive every accepted
//! telemetry event as a JSON text message.  There is no history replay; a
//! dashboard bootstraps its view from the external store and then follows
//! this feed.  An observer that stops draining is dropped by the
//! broadcaster, which surfaces here as a closed receiver.

use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use tracing::{info, warn};

pub async fn ws_observer_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_observer_socket(socket, state))
}

async fn handle_observer_socket(mut socket: WebSocket, state: AppState) {
    let (observer_id, mut events) = state.broadcaster.subscribe().await;
    info!(observer_id, "observer connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(observer_id, error = %e, "failed to serialize event");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                // The broadcaster dropped us for lagging.
                None => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    let _ = socket.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Observers have nothing to say; ignore anything else.
                Some(Ok(_)) => {}
            }
        }
    }

    state.broadcaster.unsubscribe(observer_id).await;
    info!(observer_id, "observer disconnected");
}
