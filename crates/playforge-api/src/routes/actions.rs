//! Routes for player actions.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::post};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use playforge_core::error::CoreError;
use playforge_core::event::{EventPayload, GameEvent, PlayerActionPayload};

use crate::error::ApiError;
use crate::state::AppState;

const SOURCE: &str = "api";

/// Request body for POST /{game_id}/actions.
#[derive(Debug, Deserialize)]
pub struct SubmitActionRequest {
    /// The acting player.
    pub player_id: String,
    /// The action mapping; must carry a `type` field.
    pub action: Map<String, Value>,
}

/// Response body returned after the action event is published.
#[derive(Debug, Serialize)]
pub struct SubmitActionResponse {
    /// Id of the published `player.action` event.
    pub event_id: Uuid,
}

/// POST /{game_id}/actions
#[instrument(skip(state, request), fields(player_id = %request.player_id))]
async fn submit_action(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(request): Json<SubmitActionRequest>,
) -> Result<Json<SubmitActionResponse>, ApiError> {
    if !request.action.contains_key("type") {
        return Err(ApiError(CoreError::Validation(
            "action must carry a 'type' field".to_owned(),
        )));
    }

    let event = GameEvent::new(
        SOURCE,
        state.clock.now(),
        EventPayload::PlayerAction(PlayerActionPayload {
            action: request.action,
        }),
    )
    .with_game_id(game_id.clone())
    .with_player_id(request.player_id);

    let event_id = event.envelope.event_id;
    info!(%game_id, %event_id, "publishing player.action");
    state.bus.publish(event)?;

    Ok(Json(SubmitActionResponse { event_id }))
}

/// Returns the router for player actions.
pub fn router() -> Router<AppState> {
    Router::new().route("/{game_id}/actions", post(submit_action))
}
