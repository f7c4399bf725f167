//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use storylink_api::state::AppState;
use storylink_broker::InMemoryBroker;
use storylink_core::clock::Clock;
use storylink_narrative::domain::story::{DialogueLine, Scene, Story};
use storylink_session::domain::identity::{ClientId, ParticipantRole, PlayerIdentity};
use storylink_sync::application::participant::{Participant, ParticipantDeps};
use storylink_sync::application::runtime::{self, ParticipantHandle};
use storylink_sync::config::SyncConfig;
use storylink_sync::ports::{ConnectionStatus, LoggingPlayback, LoggingRenderer};
use storylink_test_support::FixedClock;
use tokio::sync::watch;
use tower::ServiceExt;

/// Client id of the participant every test app hosts.
pub const HOST_ID: &str = "orchestrator_test";

/// Fixed timestamp used across all integration tests. Time never passes, so
/// a scene transition cooldown never expires.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// A story with `counts[i]` lines in scene `i`.
pub fn story(counts: &[usize]) -> Story {
    Story::new(
        counts
            .iter()
            .enumerate()
            .map(|(s, &n)| {
                Scene::new(
                    format!("Scene {s}"),
                    format!("bg-{s}"),
                    (0..n)
                        .map(|l| DialogueLine::new("Narrator", format!("{{playerName}} {s}.{l}")))
                        .collect(),
                )
            })
            .collect(),
    )
}

/// A running participant plus the router serving it.
pub struct TestApp {
    pub router: Router,
    pub broker: Arc<InMemoryBroker>,
    pub handle: ParticipantHandle,
    _shutdown: watch::Sender<bool>,
}

impl TestApp {
    /// A fresh copy of the router for one request.
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full app around a controller holding a `[3, 2]` story, and wait
/// until it is connected.
pub async fn build_test_app() -> TestApp {
    build_test_app_with(ParticipantRole::Controller, story(&[3, 2])).await
}

/// Build the full app around a participant with the given role and story.
pub async fn build_test_app_with(role: ParticipantRole, story: Story) -> TestApp {
    let broker = Arc::new(InMemoryBroker::new());
    let config = SyncConfig::default();
    let participant = Participant::new(
        PlayerIdentity::new("Rex", ClientId::new(HOST_ID)),
        role,
        story,
        config.clone(),
        ParticipantDeps {
            channel: broker.clone(),
            clock: fixed_clock(),
            renderer: Arc::new(LoggingRenderer),
            playback: Arc::new(LoggingPlayback),
        },
    )
    .unwrap();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let (handle, _task) = runtime::spawn(participant, shutdown_rx);
    wait_for("participant connected", || {
        handle.snapshot().status == ConnectionStatus::Connected
    })
    .await;

    let router = storylink_api::app(AppState::new(
        handle.clone(),
        broker.clone(),
        config.topic_prefix,
    ));
    TestApp {
        router,
        broker,
        handle,
        _shutdown: shutdown,
    }
}

/// Polls `condition` until it holds, failing the test after three seconds.
pub async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let reached = tokio::time::timeout(Duration::from_secs(3), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for: {what}");
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, Method::GET, uri, None).await
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, Method::POST, uri, Some(body)).await
}

/// Send a POST request without a body and return the response.
pub async fn post_empty(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, Method::POST, uri, None).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, Method::PUT, uri, Some(body)).await
}

/// Send a DELETE request and return the response.
pub async fn delete_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, Method::DELETE, uri, None).await
}
