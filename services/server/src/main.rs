// server: Telemetry relay daemon.
//
// Two listeners share one process: the raw TCP ingest gateway for devices
// and the axum server carrying the observer WebSocket feed plus the small
// HTTP API.  All state is created once here and shared by every session.

use server::gateway::IngestGateway;
use server::sink::DiscardSink;
use server::AppState;
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let token_secret = env::var("TOKEN_SECRET").expect("TOKEN_SECRET must be set");
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9000".to_owned());
    let http_addr = env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());

    let state = AppState::new(&token_secret, Arc::new(DiscardSink));

    let gateway = IngestGateway::bind(&bind_addr, state.clone())
        .await
        .expect("failed to bind device listener");
    info!(addr = %bind_addr, "device listener bound");
    tokio::spawn(gateway.run());

    let router = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .expect("failed to bind observer listener");
    info!(addr = %http_addr, "observer endpoint listening");
    axum::serve(listener, router).await.expect("server error");
}
