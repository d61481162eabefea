//! Standing reactions that turn events into state deltas.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use playforge_core::clock::Clock;
use playforge_core::error::CoreError;
use playforge_core::event::{EventPayload, GameEvent, StateChangedPayload, StateSavedPayload};
use playforge_core::handler::EventHandler;
use playforge_core::record::ScopeKey;
use playforge_state::StateManager;
use serde_json::{Map, Value};
use tracing::debug;

const SOURCE: &str = "state_service";

/// Derives the minimal partial update for a player action.
///
/// `move` replaces the position wholesale and stamps `last_move`;
/// `inventory` appends or removes one entry preserving order and the rest
/// of the sequence; `stats` shallow-merges the stats mapping key by key.
/// Unrecognized action types derive nothing.
fn derive_partial(
    action: &Map<String, Value>,
    current: &Map<String, Value>,
    timestamp: DateTime<Utc>,
) -> Map<String, Value> {
    let mut partial = Map::new();

    match action.get("type").and_then(Value::as_str) {
        Some("move") => {
            let position = action
                .get("position")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));
            partial.insert("position".to_owned(), position);
            partial.insert(
                "last_move".to_owned(),
                Value::String(timestamp.to_rfc3339()),
            );
        }
        Some("inventory") => {
            let Some(item) = action.get("item") else {
                return partial;
            };
            let mut inventory = current
                .get("inventory")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            match action.get("action").and_then(Value::as_str) {
                Some("add_item") => inventory.push(item.clone()),
                Some("remove_item") => {
                    if let Some(index) = inventory.iter().position(|entry| entry == item) {
                        inventory.remove(index);
                    }
                }
                _ => return partial,
            }
            partial.insert("inventory".to_owned(), Value::Array(inventory));
        }
        Some("stats") => {
            let Some(updates) = action.get("stats").and_then(Value::as_object) else {
                return partial;
            };
            let mut stats = current
                .get("stats")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            for (stat, value) in updates {
                stats.insert(stat.clone(), value.clone());
            }
            partial.insert("stats".to_owned(), Value::Object(stats));
        }
        _ => {}
    }

    partial
}

/// True when merging `partial` into `current` would change nothing.
fn is_noop(partial: &Map<String, Value>, current: &Map<String, Value>) -> bool {
    partial
        .iter()
        .all(|(field, value)| current.get(field) == Some(value))
}

/// Applies player actions to the affected record and emits
/// `state.changed` when — and only when — at least one field changed.
pub struct PlayerActionStateHandler {
    state: Arc<StateManager>,
}

impl PlayerActionStateHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(state: Arc<StateManager>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl EventHandler for PlayerActionStateHandler {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn handle(&self, event: &GameEvent) -> Result<Vec<GameEvent>, CoreError> {
        let EventPayload::PlayerAction(payload) = &event.payload else {
            return Ok(Vec::new());
        };
        let (Some(game_id), Some(player_id)) =
            (&event.envelope.game_id, &event.envelope.player_id)
        else {
            debug!(event_id = %event.envelope.event_id, "player action without scope; ignoring");
            return Ok(Vec::new());
        };

        let timestamp = event.envelope.timestamp;
        let current = self
            .state
            .get(game_id, player_id)
            .await?
            .map(|record| record.data)
            .unwrap_or_default();
        let candidate = derive_partial(&payload.action, &current, timestamp);
        if candidate.is_empty() || is_noop(&candidate, &current) {
            return Ok(Vec::new());
        }

        // Re-derive inside the key's critical section so the merge never
        // works from a stale pre-image.
        let action = payload.action.clone();
        let (old, new) = self
            .state
            .update_with(game_id, player_id, move |data| {
                derive_partial(&action, data, timestamp)
            })
            .await?;

        let state_key = ScopeKey::new(game_id.clone(), player_id.clone());
        Ok(vec![
            GameEvent::new(
                SOURCE,
                timestamp,
                EventPayload::StateChanged(StateChangedPayload {
                    state_key: state_key.to_string(),
                    old_state: old.map(|record| record.data),
                    new_state: new.data,
                }),
            )
            .with_game_id(game_id.clone())
            .with_player_id(player_id.clone()),
        ])
    }
}

/// Initializes the creator's record when a game is created and tracks the
/// game as active.
pub struct GameCreatedHandler {
    state: Arc<StateManager>,
    active_games: Arc<DashMap<String, String>>,
}

impl GameCreatedHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(state: Arc<StateManager>, active_games: Arc<DashMap<String, String>>) -> Self {
        Self {
            state,
            active_games,
        }
    }
}

#[async_trait]
impl EventHandler for GameCreatedHandler {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn handle(&self, event: &GameEvent) -> Result<Vec<GameEvent>, CoreError> {
        let EventPayload::GameCreated(payload) = &event.payload else {
            return Ok(Vec::new());
        };
        let Some(game_id) = &event.envelope.game_id else {
            debug!(event_id = %event.envelope.event_id, "game.created without game_id; ignoring");
            return Ok(Vec::new());
        };

        self.active_games
            .insert(game_id.clone(), "active".to_owned());

        let mut initial = Map::new();
        initial.insert(
            "game_created_at".to_owned(),
            Value::String(event.envelope.timestamp.to_rfc3339()),
        );
        initial.insert(
            "game_config".to_owned(),
            Value::Object(payload.game_config.clone()),
        );
        initial.insert("status".to_owned(), Value::String("active".to_owned()));

        self.state
            .update(game_id, &payload.creator_id, initial)
            .await?;
        debug!(%game_id, creator_id = %payload.creator_id, "game state initialized");
        Ok(Vec::new())
    }
}

/// Flushes a record on demand and confirms with `state.saved`.
pub struct SaveRequestHandler {
    state: Arc<StateManager>,
    clock: Arc<dyn Clock>,
}

impl SaveRequestHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(state: Arc<StateManager>, clock: Arc<dyn Clock>) -> Self {
        Self { state, clock }
    }
}

#[async_trait]
impl EventHandler for SaveRequestHandler {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn handle(&self, event: &GameEvent) -> Result<Vec<GameEvent>, CoreError> {
        if !matches!(event.payload, EventPayload::SaveRequested) {
            return Ok(Vec::new());
        }
        let (Some(game_id), Some(player_id)) =
            (&event.envelope.game_id, &event.envelope.player_id)
        else {
            return Err(CoreError::Validation(
                "save request requires game_id and player_id".to_owned(),
            ));
        };

        self.state.save(game_id, player_id).await?;
        let saved_at = self.clock.now();

        Ok(vec![
            GameEvent::new(
                SOURCE,
                saved_at,
                EventPayload::StateSaved(StateSavedPayload { saved_at }),
            )
            .with_game_id(game_id.clone())
            .with_player_id(player_id.clone()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use playforge_core::event::PlayerActionPayload;
    use playforge_core::store::StateStore;
    use playforge_test_support::{FixedClock, RecordingStore};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn manager() -> Arc<StateManager> {
        Arc::new(StateManager::new(
            Arc::new(RecordingStore::new()) as Arc<dyn StateStore>,
            Arc::new(FixedClock(now())),
        ))
    }

    fn action_event(action: Value) -> GameEvent {
        let Value::Object(action) = action else {
            panic!("action must be an object");
        };
        GameEvent::new(
            "gateway",
            now(),
            EventPayload::PlayerAction(PlayerActionPayload { action }),
        )
        .with_game_id("g1")
        .with_player_id("p1")
    }

    #[tokio::test]
    async fn test_move_action_replaces_position_and_emits_state_changed() {
        // Arrange
        let state = manager();
        let handler = PlayerActionStateHandler::new(Arc::clone(&state));
        let event = action_event(json!({"type": "move", "position": {"x": 3, "y": 4}}));

        // Act
        let follow_ups = handler.handle(&event).await.unwrap();

        // Assert
        assert_eq!(follow_ups.len(), 1);
        match &follow_ups[0].payload {
            EventPayload::StateChanged(payload) => {
                assert_eq!(payload.state_key, "g1:p1");
                assert!(payload.old_state.is_none());
                assert_eq!(payload.new_state["position"], json!({"x": 3, "y": 4}));
                assert!(payload.new_state.contains_key("last_move"));
            }
            other => panic!("expected StateChanged, got {other:?}"),
        }
        let record = state.get("g1", "p1").await.unwrap().unwrap();
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn test_inventory_add_and_remove_preserve_order() {
        // Arrange
        let state = manager();
        let handler = PlayerActionStateHandler::new(Arc::clone(&state));

        // Act — add three items, then remove the middle one.
        for item in ["sword", "rope", "lantern"] {
            handler
                .handle(&action_event(json!({
                    "type": "inventory", "action": "add_item", "item": item
                })))
                .await
                .unwrap();
        }
        let follow_ups = handler
            .handle(&action_event(json!({
                "type": "inventory", "action": "remove_item", "item": "rope"
            })))
            .await
            .unwrap();

        // Assert
        assert_eq!(follow_ups.len(), 1);
        let record = state.get("g1", "p1").await.unwrap().unwrap();
        assert_eq!(record.data["inventory"], json!(["sword", "lantern"]));
        assert_eq!(record.version, 4);
    }

    #[tokio::test]
    async fn test_removing_absent_item_changes_nothing_and_emits_nothing() {
        // Arrange
        let state = manager();
        let handler = PlayerActionStateHandler::new(Arc::clone(&state));
        handler
            .handle(&action_event(json!({
                "type": "inventory", "action": "add_item", "item": "sword"
            })))
            .await
            .unwrap();

        // Act
        let follow_ups = handler
            .handle(&action_event(json!({
                "type": "inventory", "action": "remove_item", "item": "ghost"
            })))
            .await
            .unwrap();

        // Assert — no event, no version bump.
        assert!(follow_ups.is_empty());
        let record = state.get("g1", "p1").await.unwrap().unwrap();
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn test_stats_action_merges_key_by_key() {
        // Arrange
        let state = manager();
        let handler = PlayerActionStateHandler::new(Arc::clone(&state));
        handler
            .handle(&action_event(json!({
                "type": "stats", "stats": {"strength": 10, "agility": 7}
            })))
            .await
            .unwrap();

        // Act — update one stat; the other must survive.
        handler
            .handle(&action_event(json!({
                "type": "stats", "stats": {"strength": 12}
            })))
            .await
            .unwrap();

        // Assert
        let record = state.get("g1", "p1").await.unwrap().unwrap();
        assert_eq!(record.data["stats"], json!({"strength": 12, "agility": 7}));
    }

    #[tokio::test]
    async fn test_unknown_action_type_is_ignored() {
        // Arrange
        let state = manager();
        let handler = PlayerActionStateHandler::new(Arc::clone(&state));

        // Act
        let follow_ups = handler
            .handle(&action_event(json!({"type": "dance"})))
            .await
            .unwrap();

        // Assert
        assert!(follow_ups.is_empty());
        assert!(state.get("g1", "p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_action_without_scope_is_ignored() {
        // Arrange
        let state = manager();
        let handler = PlayerActionStateHandler::new(Arc::clone(&state));
        let mut event = action_event(json!({"type": "move", "position": {"x": 1}}));
        event.envelope.player_id = None;

        // Act & Assert
        assert!(handler.handle(&event).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_game_created_initializes_creator_record() {
        // Arrange
        let state = manager();
        let active = Arc::new(DashMap::new());
        let handler = GameCreatedHandler::new(Arc::clone(&state), Arc::clone(&active));
        let mut game_config = Map::new();
        game_config.insert("difficulty".to_owned(), json!("hard"));
        let event = GameEvent::new(
            "gateway",
            now(),
            EventPayload::GameCreated(playforge_core::event::GameCreatedPayload {
                game_name: "Dragon Keep".to_owned(),
                creator_id: "p1".to_owned(),
                game_config,
            }),
        )
        .with_game_id("g1");

        // Act
        let follow_ups = handler.handle(&event).await.unwrap();

        // Assert
        assert!(follow_ups.is_empty());
        assert_eq!(active.get("g1").unwrap().value(), "active");
        let record = state.get("g1", "p1").await.unwrap().unwrap();
        assert_eq!(record.data["status"], json!("active"));
        assert_eq!(record.data["game_config"], json!({"difficulty": "hard"}));
    }

    #[tokio::test]
    async fn test_save_request_flushes_and_confirms() {
        // Arrange
        let state = manager();
        state
            .update("g1", "p1", Map::new())
            .await
            .unwrap();
        let handler = SaveRequestHandler::new(Arc::clone(&state), Arc::new(FixedClock(now())));
        let event = GameEvent::new("gateway", now(), EventPayload::SaveRequested)
            .with_game_id("g1")
            .with_player_id("p1");

        // Act
        let follow_ups = handler.handle(&event).await.unwrap();

        // Assert
        assert_eq!(follow_ups.len(), 1);
        match &follow_ups[0].payload {
            EventPayload::StateSaved(payload) => assert_eq!(payload.saved_at, now()),
            other => panic!("expected StateSaved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_save_request_for_unknown_record_fails() {
        // Arrange
        let state = manager();
        let handler = SaveRequestHandler::new(state, Arc::new(FixedClock(now())));
        let event = GameEvent::new("gateway", now(), EventPayload::SaveRequested)
            .with_game_id("g1")
            .with_player_id("nobody");

        // Act & Assert — surfaces through the bus error path.
        assert!(handler.handle(&event).await.is_err());
    }
}
