//! Routes for reading and flushing state records.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::get, routing::post};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use playforge_core::error::CoreError;
use playforge_core::event::{EventPayload, GameEvent};
use playforge_core::record::StateRecord;

use crate::error::ApiError;
use crate::state::AppState;

const SOURCE: &str = "api";

/// Response body returned after the save request is published.
#[derive(Debug, Serialize)]
pub struct SaveStateResponse {
    /// Id of the published `state.save_request` event.
    pub event_id: Uuid,
}

/// GET /{game_id}/{key}
#[instrument(skip(state))]
async fn get_state(
    State(state): State<AppState>,
    Path((game_id, key)): Path<(String, String)>,
) -> Result<Json<StateRecord>, ApiError> {
    let record = state
        .state
        .get(&game_id, &key)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("no state record for '{game_id}:{key}'")))?;
    Ok(Json(record))
}

/// POST /{game_id}/{key}/save
#[instrument(skip(state))]
async fn save_state(
    State(state): State<AppState>,
    Path((game_id, key)): Path<(String, String)>,
) -> Result<Json<SaveStateResponse>, ApiError> {
    let event = GameEvent::new(SOURCE, state.clock.now(), EventPayload::SaveRequested)
        .with_game_id(game_id.clone())
        .with_player_id(key);

    let event_id = event.envelope.event_id;
    info!(%game_id, %event_id, "publishing state.save_request");
    state.bus.publish(event)?;

    Ok(Json(SaveStateResponse { event_id }))
}

/// Returns the router for state access.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{game_id}/{key}", get(get_state))
        .route("/{game_id}/{key}/save", post(save_state))
}
