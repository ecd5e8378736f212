// Reconnection arbitration: a device that reconnects displaces its own
// stale session, and the displaced session's close must not evict the
// newer entry.

use pw_protocol::{DeviceFrame, ErrorNotice};
use pw_test_utils::{MockDevice, MockObserver};
use serde_json::json;
use server::auth::issue_token;
use server::gateway::IngestGateway;
use server::sink::DiscardSink;
use server::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

const SECRET: &str = "supersede-test-secret";

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

fn frame(device_id: &str, token: &str, seq: u64) -> DeviceFrame {
    DeviceFrame {
        device_id: device_id.to_owned(),
        device_name: None,
        token: Some(token.to_owned()),
        payload: json!({"cpu": "10.00", "seq": seq}),
    }
}

async fn active_devices(http_addr: SocketAddr) -> serde_json::Value {
    reqwest::get(format!("http://{}/api/v1/devices/active", http_addr))
        .await
        .expect("get")
        .json()
        .await
        .expect("json")
}

#[tokio::test]
async fn reconnect_supersedes_the_old_session() {
    let (device_addr, http_addr) = spawn_relay().await;
    let mut observer = MockObserver::connect(&format!("ws://{}/ws/v1/observers", http_addr))
        .await
        .expect("observer connect");
    sleep(Duration::from_millis(100)).await;

    let token = issue_token(SECRET, "laptop-1", 3600);

    let mut old_conn = MockDevice::connect(device_addr).await.expect("connect");
    old_conn
        .send_frame(&frame("laptop-1", &token, 1))
        .await
        .expect("send");
    let event = timeout(Duration::from_secs(2), observer.recv_event())
        .await
        .expect("event timeout")
        .expect("event");
    assert_eq!(event.data["seq"], 1);

    // Same device reconnects before the old socket is reaped.
    let mut new_conn = MockDevice::connect(device_addr).await.expect("connect");
    new_conn
        .send_frame(&frame("laptop-1", &token, 2))
        .await
        .expect("send");

    // The server force-closes the old transport with a supersede notice.
    let closing_bytes = timeout(Duration::from_secs(2), old_conn.wait_closed())
        .await
        .expect("close timeout")
        .expect("close");
    let notice: ErrorNotice = serde_json::from_slice(&closing_bytes).expect("notice decodes");
    assert_eq!(notice.error, "Session superseded by a newer connection");

    // Exactly one further broadcast event, from the new session.
    let event = timeout(Duration::from_secs(2), observer.recv_event())
        .await
        .expect("event timeout")
        .expect("event");
    assert_eq!(event.data["seq"], 2);
    assert!(
        timeout(Duration::from_millis(300), observer.recv_event())
            .await
            .is_err(),
        "no duplicate event"
    );

    let body = active_devices(http_addr).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["devices"], json!(["laptop-1"]));
}

#[tokio::test]
async fn stale_close_does_not_evict_the_new_session() {
    let (device_addr, http_addr) = spawn_relay().await;

    let token = issue_token(SECRET, "laptop-1", 3600);

    let mut old_conn = MockDevice::connect(device_addr).await.expect("connect");
    old_conn
        .send_frame(&frame("laptop-1", &token, 1))
        .await
        .expect("send");
    sleep(Duration::from_millis(100)).await;

    let mut new_conn = MockDevice::connect(device_addr).await.expect("connect");
    new_conn
        .send_frame(&frame("laptop-1", &token, 2))
        .await
        .expect("send");

    // Let the displaced session finish its close path (release is a no-op
    // for it — the entry now belongs to the new session).
    let _ = timeout(Duration::from_secs(2), old_conn.wait_closed()).await;
    drop(old_conn);
    sleep(Duration::from_millis(200)).await;

    let body = active_devices(http_addr).await;
    assert_eq!(body["devices"], json!(["laptop-1"]));

    // The new session is still live and accepted.
    new_conn
        .send_frame(&frame("laptop-1", &token, 3))
        .await
        .expect("send");
    sleep(Duration::from_millis(100)).await;
    let body = active_devices(http_addr).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn disconnect_releases_the_registry_entry() {
    let (device_addr, http_addr) = spawn_relay().await;

    let token = issue_token(SECRET, "laptop-1", 3600);
    let mut device = MockDevice::connect(device_addr).await.expect("connect");
    device
        .send_frame(&frame("laptop-1", &token, 1))
        .await
        .expect("send");
    sleep(Duration::from_millis(100)).await;
    assert_eq!(active_devices(http_addr).await["count"], 1);

    drop(device);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(active_devices(http_addr).await["count"], 0);
}

#[tokio::test]
async fn repeated_frames_from_one_session_cause_no_churn() {
    let (device_addr, http_addr) = spawn_relay().await;
    let mut observer = MockObserver::connect(&format!("ws://{}/ws/v1/observers", http_addr))
        .await
        .expect("observer connect");
    sleep(Duration::from_millis(100)).await;

    let token = issue_token(SECRET, "laptop-1", 3600);
    let mut device = MockDevice::connect(device_addr).await.expect("connect");
    for seq in 1..=3 {
        device
            .send_frame(&frame("laptop-1", &token, seq))
            .await
            .expect("send");
    }

    for seq in 1..=3 {
        let event = timeout(Duration::from_secs(2), observer.recv_event())
            .await
            .expect("event timeout")
            .expect("event");
        assert_eq!(event.data["seq"], seq);
    }
    assert_eq!(active_devices(http_addr).await["count"], 1);
}
