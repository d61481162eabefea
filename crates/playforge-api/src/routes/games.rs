//! Routes for game lifecycle.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use playforge_core::event::{EventPayload, GameCreatedPayload, GameEvent};

use crate::error::ApiError;
use crate::state::AppState;

const SOURCE: &str = "api";

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    /// Display name of the game.
    pub game_name: String,
    /// Identifier of the creating player.
    pub creator_id: String,
    /// Free-form game configuration.
    #[serde(default)]
    pub game_config: Map<String, Value>,
}

/// Response body returned after the creation event is published.
#[derive(Debug, Serialize)]
pub struct CreateGameResponse {
    /// The id assigned to the new game.
    pub game_id: String,
    /// Id of the published `game.created` event.
    pub event_id: Uuid,
}

/// Response body for GET /.
#[derive(Debug, Serialize)]
pub struct ListGamesResponse {
    /// Ids of active games.
    pub games: Vec<String>,
}

/// POST /
#[instrument(skip(state, request), fields(game_name = %request.game_name))]
async fn create_game(
    State(state): State<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> Result<Json<CreateGameResponse>, ApiError> {
    let game_id = Uuid::new_v4().to_string();
    let event = GameEvent::new(
        SOURCE,
        state.clock.now(),
        EventPayload::GameCreated(GameCreatedPayload {
            game_name: request.game_name,
            creator_id: request.creator_id.clone(),
            game_config: request.game_config,
        }),
    )
    .with_game_id(game_id.clone())
    .with_player_id(request.creator_id);

    let event_id = event.envelope.event_id;
    info!(%game_id, %event_id, "publishing game.created");
    state.bus.publish(event)?;

    Ok(Json(CreateGameResponse { game_id, event_id }))
}

/// GET /
async fn list_games(State(state): State<AppState>) -> Json<ListGamesResponse> {
    let mut games = state.coordinator.active_games();
    games.sort();
    Json(ListGamesResponse { games })
}

/// Returns the router for game lifecycle.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(create_game).get(list_games))
}
