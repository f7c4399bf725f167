//! Routes for audio and video playback.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use serde::{Deserialize, Serialize};
use storylink_sync::application::runtime::{CommandOutcome, ParticipantRequest};
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /volume.
#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    /// Fraction of full volume; clamped into `0.0..=1.0`.
    pub volume: f64,
}

/// Response body for playback commands.
#[derive(Debug, Serialize)]
pub struct PlaybackResponse {
    /// What the command did.
    pub outcome: CommandOutcome,
    /// Local volume after the command.
    pub volume: f64,
}

async fn dispatch(
    state: &AppState,
    request: ParticipantRequest,
) -> Result<Json<PlaybackResponse>, ApiError> {
    let outcome = state.participant.send(request).await?;
    Ok(Json(PlaybackResponse {
        outcome,
        volume: state.participant.snapshot().volume,
    }))
}

/// POST /pause
#[instrument(skip(state))]
async fn pause(State(state): State<AppState>) -> Result<Json<PlaybackResponse>, ApiError> {
    dispatch(&state, ParticipantRequest::PauseAll).await
}

/// POST /resume
#[instrument(skip(state))]
async fn resume(State(state): State<AppState>) -> Result<Json<PlaybackResponse>, ApiError> {
    dispatch(&state, ParticipantRequest::ResumeAll).await
}

/// POST /volume
#[instrument(skip(state, request), fields(volume = request.volume))]
async fn set_volume(
    State(state): State<AppState>,
    Json(request): Json<VolumeRequest>,
) -> Result<Json<PlaybackResponse>, ApiError> {
    dispatch(&state, ParticipantRequest::SetVolume(request.volume)).await
}

/// Returns the router for playback endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/volume", post(set_volume))
}
