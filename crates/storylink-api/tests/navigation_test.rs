//! Integration tests for the navigation routes.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use storylink_core::channel::{ChannelMessage, SyncChannel};

#[tokio::test]
async fn test_get_state_describes_current_line() {
    let test_app = common::build_test_app().await;

    let (status, json) = common::get_json(test_app.app(), "/api/v1/navigation/state").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["client_id"], common::HOST_ID);
    assert_eq!(json["role"], "controller");
    assert_eq!(json["navigation"]["flat_position"], 0);
    assert_eq!(json["navigation"]["total_lines"], 5);
    assert_eq!(json["navigation"]["text"], "Rex 0.0");
    assert_eq!(json["navigation"]["can_go_back"], false);
}

#[tokio::test]
async fn test_next_moves_and_publishes_position() {
    // Arrange
    let test_app = common::build_test_app().await;

    // Act
    let (status, json) = common::post_empty(test_app.app(), "/api/v1/navigation/next").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"]["result"], "navigated");
    assert_eq!(json["outcome"]["outcome"], "moved");
    assert_eq!(json["outcome"]["to"], json!({ "scene_index": 0, "line_index": 1 }));
    assert_eq!(json["state"]["navigation"]["flat_position"], 1);
    let retained = test_app.broker.retained("nerfwar/story/state");
    assert_eq!(retained.len(), 1);
    let payload: serde_json::Value = serde_json::from_str(&retained[0].payload).unwrap();
    assert_eq!(payload["position"], 1);
    assert_eq!(payload["dialogueIndex"], 1);
}

#[tokio::test]
async fn test_previous_at_start_is_unchanged() {
    let test_app = common::build_test_app().await;

    let (status, json) = common::post_empty(test_app.app(), "/api/v1/navigation/previous").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"]["outcome"], "unchanged");
}

#[tokio::test]
async fn test_steps_are_suppressed_after_scene_crossing() {
    // Arrange: the test clock never moves, so the cooldown never ends.
    let test_app = common::build_test_app().await;
    for _ in 0..2 {
        common::post_empty(test_app.app(), "/api/v1/navigation/next").await;
    }

    // Act
    let (_, crossing) = common::post_empty(test_app.app(), "/api/v1/navigation/next").await;
    let (status, suppressed) = common::post_empty(test_app.app(), "/api/v1/navigation/next").await;

    // Assert
    assert_eq!(crossing["outcome"]["crossed_scene"], true);
    assert_eq!(crossing["state"]["navigation"]["transitioning"], true);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(suppressed["outcome"]["outcome"], "suppressed");
    assert_eq!(suppressed["state"]["navigation"]["scene_index"], 1);
    assert_eq!(suppressed["state"]["navigation"]["line_index"], 0);
}

#[tokio::test]
async fn test_jump_by_scene_and_line_ignores_cooldown() {
    let test_app = common::build_test_app().await;

    let (status, json) = common::post_json(
        test_app.app(),
        "/api/v1/navigation/jump",
        &json!({ "scene_index": 1, "line_index": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"]["navigation"]["flat_position"], 4);
    assert_eq!(json["state"]["navigation"]["can_go_forward"], false);
}

#[tokio::test]
async fn test_jump_by_flat_position_is_clamped() {
    let test_app = common::build_test_app().await;

    let (status, json) = common::post_json(
        test_app.app(),
        "/api/v1/navigation/jump",
        &json!({ "flat": 99 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"]["navigation"]["flat_position"], 4);
}

#[tokio::test]
async fn test_jump_without_target_is_rejected() {
    let test_app = common::build_test_app().await;

    let (status, json) =
        common::post_json(test_app.app(), "/api/v1/navigation/jump", &json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_reset_returns_to_first_line() {
    // Arrange
    let test_app = common::build_test_app().await;
    common::post_json(
        test_app.app(),
        "/api/v1/navigation/jump",
        &json!({ "flat": 3 }),
    )
    .await;

    // Act
    let (status, json) = common::post_empty(test_app.app(), "/api/v1/navigation/reset").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"]["result"], "reset");
    assert_eq!(json["outcome"]["from"], json!({ "scene_index": 1, "line_index": 0 }));
    assert_eq!(json["state"]["navigation"]["flat_position"], 0);
}

#[tokio::test]
async fn test_sync_republishes_current_position() {
    // Arrange
    let test_app = common::build_test_app().await;
    test_app
        .broker
        .publish(ChannelMessage::retained("nerfwar/story/state", ""))
        .await
        .unwrap();

    // Act
    let (status, json) = common::post_empty(test_app.app(), "/api/v1/navigation/sync").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"]["result"], "done");
    assert_eq!(test_app.broker.retained("nerfwar/story/state").len(), 1);
}
