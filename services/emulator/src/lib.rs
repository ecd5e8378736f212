//! Synthetic telemetry device.
//!
//! Connects to the ingest gateway and pushes a metrics frame on a fixed
//! interval, the way a real monitoring agent would.  When the connection
//! drops (or the server closes it), the emulator backs off and reconnects
//! with the same token.

use chrono::Utc;
use pw_protocol::DeviceFrame;
use rand::Rng;
use serde_json::json;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct EmulatorConfig {
    /// Ingest gateway address, e.g. `127.0.0.1:9000`.
    pub server_addr: String,
    pub device_id: String,
    pub device_name: Option<String>,
    /// Raw signed token, as minted by the login service.
    pub token: String,
    /// Delay between frames in milliseconds.
    pub interval_ms: u64,
}

/// Synthesize one metrics payload in the shape real agents report.
pub fn synth_payload(uptime_secs: u64) -> serde_json::Value {
    let mut rng = rand::thread_rng();
    json!({
        "cpu": format!("{:.2}", rng.gen_range(0.0..100.0)),
        "ram": format!("{:.2}", rng.gen_range(20.0..95.0)),
        "temp": (rng.gen_range(35.0..75.0_f64) * 10.0).round() / 10.0,
        "battery": rng.gen_range(5..=100),
        "uptime": uptime_secs,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

pub fn build_frame(config: &EmulatorConfig, uptime_secs: u64) -> DeviceFrame {
    DeviceFrame {
        device_id: config.device_id.clone(),
        device_name: config.device_name.clone(),
        token: Some(config.token.clone()),
        payload: synth_payload(uptime_secs),
    }
}

/// Drive one connected stream until a write fails.
async fn stream_frames(config: &EmulatorConfig, stream: &mut TcpStream, uptime_secs: &mut u64) {
    loop {
        let frame = build_frame(config, *uptime_secs);
        let mut json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize frame");
                return;
            }
        };
        json.push('\n');
        if stream.write_all(json.as_bytes()).await.is_err() {
            warn!(device_id = %config.device_id, "connection lost");
            return;
        }
        *uptime_secs += config.interval_ms / 1000;
        sleep(Duration::from_millis(config.interval_ms)).await;
    }
}

/// Run the emulator.  This function never returns.
pub async fn run(config: EmulatorConfig) {
    let mut uptime_secs: u64 = 0;
    loop {
        match TcpStream::connect(&config.server_addr).await {
            Ok(mut stream) => {
                info!(
                    device_id = %config.device_id,
                    server = %config.server_addr,
                    "connected, streaming telemetry"
                );
                stream_frames(&config, &mut stream, &mut uptime_secs).await;
            }
            Err(e) => {
                warn!(server = %config.server_addr, error = %e, "failed to connect");
            }
        }
        info!(delay = ?RECONNECT_DELAY, "reconnecting");
        sleep(RECONNECT_DELAY).await;
    }
}
