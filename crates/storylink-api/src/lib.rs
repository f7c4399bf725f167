//! Storylink API: HTTP control surface and WebSocket relay for one hosted
//! participant.

pub mod config;
pub mod error;
pub mod routes;
pub mod sample;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full router.
pub fn app(state: AppState) -> Router {
    // TODO: Replace CorsLayer::permissive() with the deployment's origins.
    Router::new()
        .merge(routes::health::router())
        .merge(routes::relay::router())
        .nest("/api/v1/navigation", routes::navigation::router())
        .nest("/api/v1/story", routes::story::router())
        .nest("/api/v1/devices", routes::devices::router())
        .nest("/api/v1/playback", routes::playback::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
