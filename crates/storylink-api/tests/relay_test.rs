//! Integration tests for the WebSocket relay.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use storylink_core::channel::{ChannelMessage, Subscription, SyncChannel};
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const ANNOUNCE_TOPIC: &str = "nerfwar/orchestrator/announce";

async fn serve(test_app: &common::TestApp) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = test_app.app();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn ws_connect(addr: SocketAddr) -> WsStream {
    let (ws, _resp) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

/// Waits for a text frame matching `predicate`, skipping others.
async fn ws_expect_frame(
    ws: &mut WsStream,
    mut predicate: impl FnMut(&serde_json::Value) -> bool,
) -> serde_json::Value {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let WsMessage::Text(text) = ws.next().await.unwrap().unwrap() {
                let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
                if predicate(&frame) {
                    return frame;
                }
            }
        }
    })
    .await
    .expect("no matching frame within two seconds")
}

#[tokio::test]
async fn test_retained_state_is_replayed_on_connect() {
    // Arrange
    let test_app = common::build_test_app().await;
    common::post_empty(test_app.app(), "/api/v1/navigation/next").await;
    let addr = serve(&test_app).await;

    // Act
    let mut ws = ws_connect(addr).await;

    // Assert
    let frame = ws_expect_frame(&mut ws, |frame| frame["topic"] == "nerfwar/story/state").await;
    assert_eq!(frame["retain"], true);
    let payload: serde_json::Value =
        serde_json::from_str(frame["payload"].as_str().unwrap()).unwrap();
    assert_eq!(payload["position"], 1);
}

#[tokio::test]
async fn test_live_traffic_is_forwarded_to_socket() {
    // Arrange
    let test_app = common::build_test_app().await;
    let addr = serve(&test_app).await;
    let mut ws = ws_connect(addr).await;
    // The controller's retained announce arrives first once subscribed.
    ws_expect_frame(&mut ws, |frame| frame["topic"] == ANNOUNCE_TOPIC).await;

    // Act
    common::post_json(
        test_app.app(),
        "/api/v1/navigation/jump",
        &json!({ "flat": 3 }),
    )
    .await;

    // Assert
    let frame = ws_expect_frame(&mut ws, |frame| {
        frame["topic"] == "nerfwar/story/state"
            && frame["payload"].as_str().is_some_and(|p| p.contains("\"position\":3"))
    })
    .await;
    assert_eq!(frame["retain"], true);
}

#[tokio::test]
async fn test_socket_frames_are_published_to_broker() {
    // Arrange
    let test_app = common::build_test_app().await;
    let addr = serve(&test_app).await;
    let mut heartbeats = test_app
        .broker
        .subscribe(&["nerfwar/clients/heartbeat".to_owned()])
        .await
        .unwrap();
    let mut ws = ws_connect(addr).await;
    let message = ChannelMessage::transient(
        "nerfwar/clients/heartbeat",
        json!({ "clientId": "viewer_web", "type": "client_heartbeat", "timestamp": 1 }).to_string(),
    );

    // Act
    ws.send(WsMessage::Text(serde_json::to_string(&message).unwrap()))
        .await
        .unwrap();

    // Assert
    let received = tokio::time::timeout(Duration::from_secs(2), heartbeats.next_message())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, message);
    common::wait_for("relayed viewer listed", || {
        test_app
            .handle
            .snapshot()
            .devices
            .iter()
            .any(|device| device.client_id.as_str() == "viewer_web")
    })
    .await;
}

#[tokio::test]
async fn test_foreign_topic_gets_error_frame() {
    // Arrange
    let test_app = common::build_test_app().await;
    let addr = serve(&test_app).await;
    let mut ws = ws_connect(addr).await;

    // Act
    ws.send(WsMessage::Text(
        json!({ "topic": "elsewhere/story/state", "payload": "{}" }).to_string(),
    ))
    .await
    .unwrap();

    // Assert
    let frame = ws_expect_frame(&mut ws, |frame| frame.get("error").is_some()).await;
    assert_eq!(frame["error"], "validation_error");
    assert!(test_app.broker.retained("elsewhere/#").is_empty());
}

#[tokio::test]
async fn test_socket_closes_when_broker_goes_offline() {
    // Arrange
    let test_app = common::build_test_app().await;
    let addr = serve(&test_app).await;
    let mut ws = ws_connect(addr).await;
    ws_expect_frame(&mut ws, |frame| frame["topic"] == ANNOUNCE_TOPIC).await;

    // Act
    test_app.broker.go_offline();

    // Assert
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(WsMessage::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
