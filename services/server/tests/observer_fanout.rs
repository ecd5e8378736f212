// Observer-side behavior: fan-out to every subscriber, failure isolation,
// and the read-only HTTP surface.

use pw_protocol::DeviceFrame;
use pw_test_utils::{MockDevice, MockObserver};
use serde_json::json;
use server::auth::issue_token;
use server::gateway::IngestGateway;
use server::sink::DiscardSink;
use server::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

const SECRET: &str = "fanout-test-secret";

async fn spawn_relay() -> (SocketAddr, SocketAddr) {
    let state = AppState::new(SECRET, Arc::new(DiscardSink));
    let gateway = IngestGateway::bind("127.0.0.1:0", state.clone())
        .await
        .expect("bind gateway");
    let device_addr = gateway.local_addr();
    tokio::spawn(gateway.run());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind http listener");
    let http_addr = listener.local_addr().expect("http addr");
    let router = server::build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    (device_addr, http_addr)
}

fn frame(device_id: &str, token: &str) -> DeviceFrame {
    DeviceFrame {
        device_id: device_id.to_owned(),
        device_name: None,
        token: Some(token.to_owned()),
        payload: json!({"temp": 48.5}),
    }
}

#[tokio::test]
async fn every_observer_receives_each_event() {
    let (device_addr, http_addr) = spawn_relay().await;
    let url = format!("ws://{}/ws/v1/observers", http_addr);

    let mut observers = Vec::new();
    for _ in 0..3 {
        observers.push(MockObserver::connect(&url).await.expect("observer"));
    }
    sleep(Duration::from_millis(100)).await;

    let token = issue_token(SECRET, "laptop-1", 3600);
    let mut device = MockDevice::connect(device_addr).await.expect("connect");
    device
        .send_frame(&frame("laptop-1", &token))
        .await
        .expect("send");

    for observer in &mut observers {
        let event = timeout(Duration::from_secs(2), observer.recv_event())
            .await
            .expect("event timeout")
            .expect("event");
        assert_eq!(event.device_id, "laptop-1");
        assert_eq!(event.data, json!({"temp": 48.5}));
    }
}

#[tokio::test]
async fn observer_disconnect_does_not_affect_the_others() {
    let (device_addr, http_addr) = spawn_relay().await;
    let url = format!("ws://{}/ws/v1/observers", http_addr);

    let mut leaving = MockObserver::connect(&url).await.expect("observer");
    let mut staying = MockObserver::connect(&url).await.expect("observer");
    sleep(Duration::from_millis(100)).await;

    leaving.close().await.expect("close");
    drop(leaving);
    sleep(Duration::from_millis(100)).await;

    let token = issue_token(SECRET, "laptop-1", 3600);
    let mut device = MockDevice::connect(device_addr).await.expect("connect");
    device
        .send_frame(&frame("laptop-1", &token))
        .await
        .expect("send");

    let event = timeout(Duration::from_secs(2), staying.recv_event())
        .await
        .expect("event timeout")
        .expect("event");
    assert_eq!(event.device_id, "laptop-1");
}

#[tokio::test]
async fn late_observer_sees_no_history() {
    let (device_addr, http_addr) = spawn_relay().await;

    let token = issue_token(SECRET, "laptop-1", 3600);
    let mut device = MockDevice::connect(device_addr).await.expect("connect");
    device
        .send_frame(&frame("laptop-1", &token))
        .await
        .expect("send");
    sleep(Duration::from_millis(200)).await;

    // Subscribes after the event was published: no replay.
    let mut observer = MockObserver::connect(&format!("ws://{}/ws/v1/observers", http_addr))
        .await
        .expect("observer");
    assert!(
        timeout(Duration::from_millis(300), observer.recv_event())
            .await
            .is_err(),
        "observers must not receive events from before they subscribed"
    );
}

#[tokio::test]
async fn active_devices_endpoint_reflects_bound_sessions() {
    let (device_addr, http_addr) = spawn_relay().await;
    let url = format!("http://{}/api/v1/devices/active", http_addr);

    let body: serde_json::Value = reqwest::get(&url)
        .await
        .expect("get")
        .json()
        .await
        .expect("json");
    assert_eq!(body, json!({"success": true, "count": 0, "devices": []}));

    let mut devices = Vec::new();
    for id in ["laptop-1", "laptop-2"] {
        let token = issue_token(SECRET, id, 3600);
        let mut device = MockDevice::connect(device_addr).await.expect("connect");
        device.send_frame(&frame(id, &token)).await.expect("send");
        devices.push(device);
    }
    sleep(Duration::from_millis(200)).await;

    let body: serde_json::Value = reqwest::get(&url)
        .await
        .expect("get")
        .json()
        .await
        .expect("json");
    assert_eq!(body["count"], 2);
    assert_eq!(body["devices"], json!(["laptop-1", "laptop-2"]));
}

#[tokio::test]
async fn healthz_responds_ok() {
    let (_, http_addr) = spawn_relay().await;
    let body = reqwest::get(format!("http://{}/healthz", http_addr))
        .await
        .expect("get")
        .text()
        .await
        .expect("text");
    assert_eq!(body, "ok");
}
