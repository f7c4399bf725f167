//! Routes for moving through the story.

use axum::extract::State;
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use storylink_core::error::DomainError;
use storylink_session::domain::commands::JumpTarget;
use storylink_sync::application::participant::ParticipantSnapshot;
use storylink_sync::application::runtime::{CommandOutcome, ParticipantRequest};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /jump. Either `flat`, or both `scene_index` and
/// `line_index`.
#[derive(Debug, Deserialize)]
pub struct JumpRequest {
    /// Flat position; clamped into the story.
    pub flat: Option<i64>,
    /// Target scene.
    pub scene_index: Option<usize>,
    /// Target line within the scene.
    pub line_index: Option<usize>,
}

impl JumpRequest {
    fn target(&self) -> Result<JumpTarget, DomainError> {
        match (self.flat, self.scene_index, self.line_index) {
            (Some(flat), None, None) => Ok(JumpTarget::Flat(flat)),
            (None, Some(scene_index), Some(line_index)) => Ok(JumpTarget::SceneLine {
                scene_index,
                line_index,
            }),
            _ => Err(DomainError::Validation(
                "jump needs either flat or scene_index and line_index".into(),
            )),
        }
    }
}

/// Response body for navigation commands.
#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    /// What the command did.
    pub outcome: CommandOutcome,
    /// State after the command.
    pub state: ParticipantSnapshot,
}

pub(crate) async fn dispatch(
    state: &AppState,
    request: ParticipantRequest,
) -> Result<Json<NavigationResponse>, ApiError> {
    let outcome = state.participant.send(request).await?;
    Ok(Json(NavigationResponse {
        outcome,
        state: state.participant.snapshot().as_ref().clone(),
    }))
}

/// GET /state
async fn get_state(State(state): State<AppState>) -> Json<ParticipantSnapshot> {
    Json(state.participant.snapshot().as_ref().clone())
}

/// POST /next
#[instrument(skip(state))]
async fn next(State(state): State<AppState>) -> Result<Json<NavigationResponse>, ApiError> {
    dispatch(&state, ParticipantRequest::Next).await
}

/// POST /previous
#[instrument(skip(state))]
async fn previous(State(state): State<AppState>) -> Result<Json<NavigationResponse>, ApiError> {
    dispatch(&state, ParticipantRequest::Previous).await
}

/// POST /jump
#[instrument(skip(state, request), fields(flat = ?request.flat))]
async fn jump(
    State(state): State<AppState>,
    Json(request): Json<JumpRequest>,
) -> Result<Json<NavigationResponse>, ApiError> {
    let target = request.target()?;
    info!(jump_target = ?target, "handling jump request");
    dispatch(&state, ParticipantRequest::Jump(target)).await
}

/// POST /sync
#[instrument(skip(state))]
async fn sync(State(state): State<AppState>) -> Result<Json<NavigationResponse>, ApiError> {
    dispatch(&state, ParticipantRequest::BroadcastPosition).await
}

/// POST /reset
#[instrument(skip(state))]
async fn reset(State(state): State<AppState>) -> Result<Json<NavigationResponse>, ApiError> {
    dispatch(&state, ParticipantRequest::Reset).await
}

/// Returns the router for navigation endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/state", get(get_state))
        .route("/next", post(next))
        .route("/previous", post(previous))
        .route("/jump", post(jump))
        .route("/sync", post(sync))
        .route("/reset", post(reset))
}
