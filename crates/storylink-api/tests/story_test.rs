//! Integration tests for the story routes.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

fn story_document(texts: &[&str]) -> serde_json::Value {
    json!({
        "scenes": [{
            "title": "Camp",
            "background": "camp",
            "dialogue": texts
                .iter()
                .map(|text| json!({ "speaker": "Scout", "text": text }))
                .collect::<Vec<_>>(),
        }]
    })
}

#[tokio::test]
async fn test_export_returns_story_json() {
    // Arrange
    let test_app = common::build_test_app().await;
    let request = Request::builder()
        .uri("/api/v1/story")
        .body(Body::empty())
        .unwrap();

    // Act
    let response = test_app.app().oneshot(request).await.unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = &response.headers()[header::CONTENT_TYPE];
    assert_eq!(content_type, "application/json");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let story: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(story["scenes"].as_array().unwrap().len(), 2);
    assert_eq!(
        story["scenes"][0]["dialogue"][0]["text"],
        "{playerName} 0.0"
    );
}

#[tokio::test]
async fn test_import_replaces_story_and_reports_unchanged_reimport() {
    // Arrange
    let test_app = common::build_test_app().await;
    let (_, before) = common::get_json(test_app.app(), "/api/v1/navigation/state").await;
    let document = story_document(&["Ready", "Go"]);

    // Act
    let (status, first) = common::put_json(test_app.app(), "/api/v1/story", &document).await;
    let (_, second) = common::put_json(test_app.app(), "/api/v1/story", &document).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["replaced"], true);
    assert_ne!(first["content_hash"], before["content_hash"]);
    assert_eq!(second["replaced"], false);
    assert_eq!(second["content_hash"], first["content_hash"]);
    let retained = test_app.broker.retained("nerfwar/orchestrator/commands");
    assert_eq!(retained.len(), 1);
}

#[tokio::test]
async fn test_import_of_invalid_story_is_rejected() {
    let test_app = common::build_test_app().await;

    let (status, json) =
        common::put_json(test_app.app(), "/api/v1/story", &json!({ "scenes": [] })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_update_current_line_changes_rendered_text() {
    let test_app = common::build_test_app().await;

    let (status, json) = common::put_json(
        test_app.app(),
        "/api/v1/story/scenes/0/lines/0",
        &json!({ "speaker": "Commander", "text": "Move out, {playerName}!" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"]["navigation"]["speaker"], "Commander");
    assert_eq!(json["state"]["navigation"]["text"], "Move out, Rex!");
}

#[tokio::test]
async fn test_update_missing_line_is_out_of_range() {
    let test_app = common::build_test_app().await;

    let (status, json) = common::put_json(
        test_app.app(),
        "/api/v1/story/scenes/7/lines/0",
        &json!({ "speaker": "Commander", "text": "Hello" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "out_of_range");
}

#[tokio::test]
async fn test_insert_scene_appends_by_default() {
    // Arrange
    let test_app = common::build_test_app().await;
    let scene = json!({
        "title": "Debrief",
        "background": "tent",
        "dialogue": [{ "speaker": "Commander", "text": "Well done." }],
    });

    // Act
    let (status, json) =
        common::post_json(test_app.app(), "/api/v1/story/scenes", &json!({ "scene": scene }))
            .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"]["navigation"]["total_lines"], 6);
    let (_, story) = common::get_json(test_app.app(), "/api/v1/story").await;
    assert_eq!(story["scenes"][2]["title"], "Debrief");
}

#[tokio::test]
async fn test_insert_empty_scene_is_rejected() {
    let test_app = common::build_test_app().await;

    let (status, json) = common::post_json(
        test_app.app(),
        "/api/v1/story/scenes",
        &json!({ "index": 0, "scene": { "title": "Empty", "background": "", "dialogue": [] } }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_last_scene_cannot_be_deleted() {
    // Arrange
    let test_app = common::build_test_app().await;
    let (status, _) = common::delete_json(test_app.app(), "/api/v1/story/scenes/1").await;
    assert_eq!(status, StatusCode::OK);

    // Act
    let (status, json) = common::delete_json(test_app.app(), "/api/v1/story/scenes/0").await;

    // Assert
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_insert_and_delete_lines() {
    // Arrange
    let test_app = common::build_test_app().await;

    // Act
    let (inserted, _) = common::post_json(
        test_app.app(),
        "/api/v1/story/scenes/1/lines",
        &json!({ "index": 0, "line": { "speaker": "Scout", "text": "Contact!" } }),
    )
    .await;
    let (deleted, json) =
        common::delete_json(test_app.app(), "/api/v1/story/scenes/0/lines/2").await;

    // Assert
    assert_eq!(inserted, StatusCode::OK);
    assert_eq!(deleted, StatusCode::OK);
    assert_eq!(json["state"]["navigation"]["total_lines"], 5);
    let (_, story) = common::get_json(test_app.app(), "/api/v1/story").await;
    assert_eq!(story["scenes"][1]["dialogue"][0]["text"], "Contact!");
    assert_eq!(story["scenes"][0]["dialogue"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_media_update_is_stored_and_broadcast() {
    // Arrange
    let test_app = common::build_test_app().await;
    let media = json!({
        "image": { "data": "data:image/png;base64,AAAA", "fileName": "map.png", "timestamp": 1 }
    });

    // Act
    let (status, _) = common::put_json(
        test_app.app(),
        "/api/v1/story/scenes/0/lines/1/media",
        &media,
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let (_, story) = common::get_json(test_app.app(), "/api/v1/story").await;
    assert_eq!(
        story["scenes"][0]["dialogue"][1]["media"]["image"]["fileName"],
        "map.png"
    );
}

#[tokio::test]
async fn test_media_can_be_cleared_with_null() {
    // Arrange
    let test_app = common::build_test_app().await;
    let uri = "/api/v1/story/scenes/0/lines/0/media";
    common::put_json(
        test_app.app(),
        uri,
        &json!({ "audio": { "data": "data:audio/mp3;base64,AA", "fileName": "horn.mp3" } }),
    )
    .await;

    // Act
    let (status, _) = common::put_json(test_app.app(), uri, &serde_json::Value::Null).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let (_, story) = common::get_json(test_app.app(), "/api/v1/story").await;
    assert!(story["scenes"][0]["dialogue"][0].get("media").is_none());
}
