//! Routes for the live participant list.

use axum::extract::{Path, State};
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;
use storylink_session::domain::identity::ClientId;
use storylink_session::domain::presence::PresenceRecord;
use storylink_sync::application::runtime::ParticipantRequest;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for GET /.
#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    /// Participants heard from recently, excluding this one.
    pub devices: Vec<PresenceRecord>,
}

/// Response body for POST /{client_id}/disconnect.
#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    /// The participant told to disconnect.
    pub disconnected: ClientId,
}

/// GET /
async fn list_devices(State(state): State<AppState>) -> Json<DevicesResponse> {
    Json(DevicesResponse {
        devices: state.participant.snapshot().devices.clone(),
    })
}

/// POST /{client_id}/disconnect
#[instrument(skip(state), fields(target_device = %client_id))]
async fn disconnect_device(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<DisconnectResponse>, ApiError> {
    let target = ClientId::new(client_id);
    state
        .participant
        .send(ParticipantRequest::DisconnectDevice(target.clone()))
        .await?;
    info!("device disconnected");
    Ok(Json(DisconnectResponse {
        disconnected: target,
    }))
}

/// Returns the router for device endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_devices))
        .route("/{client_id}/disconnect", post(disconnect_device))
}
