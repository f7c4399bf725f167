//! Routes for reading, replacing and editing the story.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{
    Json, Router,
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use storylink_core::error::DomainError;
use storylink_narrative::application::content;
use storylink_narrative::domain::edit::StoryEdit;
use storylink_narrative::domain::story::{DialogueLine, DialogueMedia, Scene};
use storylink_sync::application::runtime::{CommandOutcome, ParticipantRequest};
use tracing::{info, instrument};

use super::navigation::{NavigationResponse, dispatch};
use crate::error::ApiError;
use crate::state::AppState;

/// Response body for PUT /.
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    /// `false` when the uploaded story was already held.
    pub replaced: bool,
    /// Hash of the story now held.
    pub content_hash: String,
}

/// Request body for PUT /scenes/{scene}/lines/{line}.
#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest {
    /// New speaker.
    pub speaker: String,
    /// New text.
    pub text: String,
}

/// Request body for POST /scenes.
#[derive(Debug, Deserialize)]
pub struct InsertSceneRequest {
    /// Insertion point; appends when absent.
    pub index: Option<usize>,
    /// The new scene.
    pub scene: Scene,
}

/// Request body for POST /scenes/{scene}/lines.
#[derive(Debug, Deserialize)]
pub struct InsertLineRequest {
    /// Insertion point; appends when absent.
    pub index: Option<usize>,
    /// The new line.
    pub line: DialogueLine,
}

/// GET /
async fn export_story(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let CommandOutcome::Exported { story } =
        state.participant.send(ParticipantRequest::ExportStory).await?
    else {
        return Err(ApiError(DomainError::Unavailable(
            "participant returned no story".into(),
        )));
    };
    Ok(([(header::CONTENT_TYPE, "application/json")], story))
}

/// PUT /
#[instrument(skip(state, document))]
async fn import_story(
    State(state): State<AppState>,
    Json(document): Json<serde_json::Value>,
) -> Result<Json<ImportResponse>, ApiError> {
    let story = content::import_story_value(document)?;
    info!(scenes = story.scenes.len(), "handling story import");

    let outcome = state
        .participant
        .send(ParticipantRequest::ImportStory(story))
        .await?;
    let replaced = matches!(outcome, CommandOutcome::StoryImported { replaced: true });

    Ok(Json(ImportResponse {
        replaced,
        content_hash: state.participant.snapshot().content_hash.clone(),
    }))
}

async fn edit(state: &AppState, edit: StoryEdit) -> Result<Json<NavigationResponse>, ApiError> {
    info!(edit = edit.kind(), "handling story edit");
    dispatch(state, ParticipantRequest::EditStory(edit)).await
}

/// PUT /scenes/{scene}/lines/{line}
#[instrument(skip(state, request))]
async fn update_line(
    State(state): State<AppState>,
    Path((scene_index, line_index)): Path<(usize, usize)>,
    Json(request): Json<UpdateLineRequest>,
) -> Result<Json<NavigationResponse>, ApiError> {
    edit(
        &state,
        StoryEdit::UpdateLine {
            scene_index,
            line_index,
            speaker: request.speaker,
            text: request.text,
        },
    )
    .await
}

/// PUT /scenes/{scene}/lines/{line}/media
///
/// A `null` body clears the line's media.
#[instrument(skip(state, media))]
async fn update_media(
    State(state): State<AppState>,
    Path((scene_index, line_index)): Path<(usize, usize)>,
    Json(media): Json<Option<DialogueMedia>>,
) -> Result<Json<NavigationResponse>, ApiError> {
    dispatch(
        &state,
        ParticipantRequest::UpdateMedia {
            scene_index,
            line_index,
            media: media.filter(|media| !media.is_empty()),
        },
    )
    .await
}

/// POST /scenes
#[instrument(skip(state, request), fields(index = ?request.index))]
async fn insert_scene(
    State(state): State<AppState>,
    Json(request): Json<InsertSceneRequest>,
) -> Result<Json<NavigationResponse>, ApiError> {
    edit(
        &state,
        StoryEdit::InsertScene {
            index: request.index.unwrap_or(usize::MAX),
            scene: request.scene,
        },
    )
    .await
}

/// DELETE /scenes/{scene}
#[instrument(skip(state))]
async fn delete_scene(
    State(state): State<AppState>,
    Path(scene_index): Path<usize>,
) -> Result<Json<NavigationResponse>, ApiError> {
    edit(&state, StoryEdit::DeleteScene { scene_index }).await
}

/// POST /scenes/{scene}/lines
#[instrument(skip(state, request), fields(index = ?request.index))]
async fn insert_line(
    State(state): State<AppState>,
    Path(scene_index): Path<usize>,
    Json(request): Json<InsertLineRequest>,
) -> Result<Json<NavigationResponse>, ApiError> {
    edit(
        &state,
        StoryEdit::InsertLine {
            scene_index,
            line_index: request.index.unwrap_or(usize::MAX),
            line: request.line,
        },
    )
    .await
}

/// DELETE /scenes/{scene}/lines/{line}
#[instrument(skip(state))]
async fn delete_line(
    State(state): State<AppState>,
    Path((scene_index, line_index)): Path<(usize, usize)>,
) -> Result<Json<NavigationResponse>, ApiError> {
    edit(
        &state,
        StoryEdit::DeleteLine {
            scene_index,
            line_index,
        },
    )
    .await
}

/// Returns the router for story endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(export_story).put(import_story))
        .route("/scenes", post(insert_scene))
        .route("/scenes/{scene}", delete(delete_scene))
        .route("/scenes/{scene}/lines", post(insert_line))
        .route(
            "/scenes/{scene}/lines/{line}",
            put(update_line).delete(delete_line),
        )
        .route("/scenes/{scene}/lines/{line}/media", put(update_media))
}
