//! Routes for chat messages.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::post};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use playforge_core::event::{ChatMessageSentPayload, EventPayload, GameEvent};

use crate::error::ApiError;
use crate::state::AppState;

const SOURCE: &str = "api";

/// Request body for POST /{bot_id}/messages.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// The message text.
    pub message: String,
    /// Game scope, if any.
    #[serde(default)]
    pub game_id: Option<String>,
    /// Sending player, if any.
    #[serde(default)]
    pub player_id: Option<String>,
}

/// Response body returned after the chat event is published.
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    /// Id of the published `chat.message_sent` event.
    pub event_id: Uuid,
}

/// POST /{bot_id}/messages
#[instrument(skip(state, request))]
async fn send_message(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let mut event = GameEvent::new(
        SOURCE,
        state.clock.now(),
        EventPayload::ChatMessageSent(ChatMessageSentPayload {
            bot_id: bot_id.clone(),
            message: request.message,
        }),
    );
    if let Some(game_id) = request.game_id {
        event = event.with_game_id(game_id);
    }
    if let Some(player_id) = request.player_id {
        event = event.with_player_id(player_id);
    }

    let event_id = event.envelope.event_id;
    info!(%bot_id, %event_id, "publishing chat.message_sent");
    state.bus.publish(event)?;

    Ok(Json(SendMessageResponse { event_id }))
}

/// Returns the router for chat.
pub fn router() -> Router<AppState> {
    Router::new().route("/{bot_id}/messages", post(send_message))
}
