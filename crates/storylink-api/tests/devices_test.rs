//! Integration tests for the device routes.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use storylink_core::channel::{ChannelMessage, Subscription, SyncChannel};

async fn viewer_heartbeat(test_app: &common::TestApp, client_id: &str) {
    let payload = json!({
        "clientId": client_id,
        "playerName": "Sam",
        "currentScene": 0,
        "currentDialogue": 1,
        "timestamp": 1_768_471_200_000_i64,
        "type": "client_heartbeat",
    });
    test_app
        .broker
        .publish(ChannelMessage::transient(
            "nerfwar/clients/heartbeat",
            payload.to_string(),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_devices_start_empty() {
    let test_app = common::build_test_app().await;

    let (status, json) = common::get_json(test_app.app(), "/api/v1/devices").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["devices"], json!([]));
}

#[tokio::test]
async fn test_heartbeating_viewer_is_listed() {
    // Arrange
    let test_app = common::build_test_app().await;

    // Act
    viewer_heartbeat(&test_app, "viewer_abc").await;
    let listed = || !test_app.handle.snapshot().devices.is_empty();
    common::wait_for("viewer listed", listed).await;
    let (status, json) = common::get_json(test_app.app(), "/api/v1/devices").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["devices"][0]["client_id"], "viewer_abc");
    assert_eq!(json["devices"][0]["display_name"], "Sam");
    assert_eq!(json["devices"][0]["role"], "viewer");
}

#[tokio::test]
async fn test_disconnect_sends_command_and_forgets_device() {
    // Arrange
    let test_app = common::build_test_app().await;
    viewer_heartbeat(&test_app, "viewer_abc").await;
    let listed = || !test_app.handle.snapshot().devices.is_empty();
    common::wait_for("viewer listed", listed).await;
    let mut commands = test_app
        .broker
        .subscribe(&["nerfwar/orchestrator/commands".to_owned()])
        .await
        .unwrap();

    // Act
    let (status, json) =
        common::post_empty(test_app.app(), "/api/v1/devices/viewer_abc/disconnect").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["disconnected"], "viewer_abc");
    let message = tokio::time::timeout(std::time::Duration::from_secs(1), commands.next_message())
        .await
        .unwrap()
        .unwrap();
    let payload: serde_json::Value = serde_json::from_str(&message.payload).unwrap();
    assert_eq!(payload["command"], "disconnect");
    assert_eq!(payload["targetDevice"], "viewer_abc");
    assert!(test_app.handle.snapshot().devices.is_empty());
}

#[tokio::test]
async fn test_controller_cannot_disconnect_itself() {
    let test_app = common::build_test_app().await;

    let (status, json) = common::post_empty(
        test_app.app(),
        &format!("/api/v1/devices/{}/disconnect", common::HOST_ID),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}
