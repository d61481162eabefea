//! Event envelope and payload types.
//!
//! Every event on the bus is a [`GameEvent`]: a uniform [`EventEnvelope`]
//! plus one [`EventPayload`] variant. The envelope is never subclassed;
//! polymorphism lives in the payload union only. Known event types get a
//! compile-time-checkable shape; [`EventPayload::Custom`] is the
//! forward-compatible fallback for types this build does not know about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Metadata key under which error events record the event that failed.
pub const ORIGIN_EVENT_ID_KEY: &str = "origin_event_id";

/// Uniform envelope attached to every event.
///
/// Immutable once published: delivery is at-least-once, and re-publishing
/// an envelope with an already-seen `event_id` is a duplicate delivery of
/// the same event, never a new one. Consumers must tolerate re-delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event identifier (process-lifetime unique).
    pub event_id: Uuid,
    /// Timestamp of event creation.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the producing module.
    pub source: String,
    /// Game this event is scoped to, if any.
    pub game_id: Option<String>,
    /// Player this event is scoped to, if any.
    pub player_id: Option<String>,
    /// Free-form metadata carried alongside the payload.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Wire form of a rule, as carried on `rules.add` events.
///
/// `priority` and `enabled` take the same defaults the rule engine
/// assumes when the producer omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Rule name, unique among enabled rules within its scope.
    pub name: String,
    /// Boolean condition expression over the evaluation context.
    pub condition: String,
    /// Opaque action label interpreted by downstream consumers.
    pub action: String,
    /// Evaluation priority; higher runs first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Whether the rule participates in evaluation.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Scope: a specific game, or global when absent.
    #[serde(default)]
    pub game_id: Option<String>,
}

fn default_priority() -> i32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// Payload for `game.created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCreatedPayload {
    /// Display name of the game.
    pub game_name: String,
    /// Identifier of the creating player.
    pub creator_id: String,
    /// Free-form game configuration.
    #[serde(default)]
    pub game_config: Map<String, Value>,
}

/// Payload for `player.action`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerActionPayload {
    /// The action mapping; carries a `type` field plus per-type fields.
    pub action: Map<String, Value>,
}

/// Payload for `state.changed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChangedPayload {
    /// The `(game_id, key)` scope key rendered as `game_id:key`.
    pub state_key: String,
    /// Pre-image of the record's data, absent on first creation.
    pub old_state: Option<Map<String, Value>>,
    /// Post-image of the record's data.
    pub new_state: Map<String, Value>,
}

/// Payload for `state.saved`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSavedPayload {
    /// When the flush completed.
    pub saved_at: DateTime<Utc>,
}

/// Payload for `rules.triggered`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTriggeredPayload {
    /// Name of the triggered rule.
    pub rule_name: String,
    /// The rule's action label.
    pub action: String,
    /// Condition text, action label, and the context evaluated against.
    pub details: Map<String, Value>,
}

/// Payload for `chat.message_sent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageSentPayload {
    /// Target bot.
    pub bot_id: String,
    /// The user's message.
    pub message: String,
}

/// Payload for `chat.message_received`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageReceivedPayload {
    /// Responding bot.
    pub bot_id: String,
    /// The user's message that prompted the response.
    pub message: String,
    /// The generated response text.
    pub response: String,
}

/// Payload for `system.module_error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleErrorPayload {
    /// The module in which the failure occurred.
    pub source_module: String,
    /// Short description of what failed.
    pub error: String,
    /// The underlying error rendered as text.
    pub exception: String,
}

/// Event payload variants, tagged by event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A game was created.
    GameCreated(GameCreatedPayload),
    /// A player performed an action.
    PlayerAction(PlayerActionPayload),
    /// A state record changed.
    StateChanged(StateChangedPayload),
    /// An external trigger requested a persistence flush.
    SaveRequested,
    /// A persistence flush completed.
    StateSaved(StateSavedPayload),
    /// A new rule should be registered.
    RuleAdd(RuleSpec),
    /// A rule condition evaluated to true.
    RuleTriggered(RuleTriggeredPayload),
    /// A chat message was sent to a bot.
    ChatMessageSent(ChatMessageSentPayload),
    /// A bot produced a chat response.
    ChatMessageReceived(ChatMessageReceivedPayload),
    /// A handler or module failed.
    ModuleError(ModuleErrorPayload),
    /// Forward-compatible fallback for unknown event types.
    Custom {
        /// The wire event type.
        event_type: String,
        /// Untyped payload fields.
        data: Map<String, Value>,
    },
}

/// A complete event: envelope plus typed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    /// Uniform envelope.
    pub envelope: EventEnvelope,
    /// Event-specific payload.
    pub payload: EventPayload,
}

impl GameEvent {
    /// Creates an event with a fresh id and the given timestamp.
    #[must_use]
    pub fn new(source: impl Into<String>, timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self {
            envelope: EventEnvelope {
                event_id: Uuid::new_v4(),
                timestamp,
                source: source.into(),
                game_id: None,
                player_id: None,
                metadata: Map::new(),
            },
            payload,
        }
    }

    /// Sets the game scope.
    #[must_use]
    pub fn with_game_id(mut self, game_id: impl Into<String>) -> Self {
        self.envelope.game_id = Some(game_id.into());
        self
    }

    /// Sets the player scope.
    #[must_use]
    pub fn with_player_id(mut self, player_id: impl Into<String>) -> Self {
        self.envelope.player_id = Some(player_id.into());
        self
    }

    /// Attaches a metadata field.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.envelope.metadata.insert(key.into(), value);
        self
    }

    /// Returns the wire event type tag.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match &self.payload {
            EventPayload::GameCreated(_) => "game.created",
            EventPayload::PlayerAction(_) => "player.action",
            EventPayload::StateChanged(_) => "state.changed",
            EventPayload::SaveRequested => "state.save_request",
            EventPayload::StateSaved(_) => "state.saved",
            EventPayload::RuleAdd(_) => "rules.add",
            EventPayload::RuleTriggered(_) => "rules.triggered",
            EventPayload::ChatMessageSent(_) => "chat.message_sent",
            EventPayload::ChatMessageReceived(_) => "chat.message_received",
            EventPayload::ModuleError(_) => "system.module_error",
            EventPayload::Custom { event_type, .. } => event_type,
        }
    }

    /// Returns the bus topic this event is delivered on.
    ///
    /// Topics and event types share the same namespace; the strings are an
    /// integration contract.
    #[must_use]
    pub fn topic(&self) -> &str {
        self.event_type()
    }
}

/// Topic on which module errors are published.
pub const MODULE_ERROR_TOPIC: &str = "system.module_error";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_event_type_matches_topic_contract() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let event = GameEvent::new(
            "state_service",
            now,
            EventPayload::StateChanged(StateChangedPayload {
                state_key: "g1:p1".to_owned(),
                old_state: None,
                new_state: Map::new(),
            }),
        );

        assert_eq!(event.event_type(), "state.changed");
        assert_eq!(event.topic(), "state.changed");
    }

    #[test]
    fn test_custom_payload_routes_by_its_own_type() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let event = GameEvent::new(
            "gateway",
            now,
            EventPayload::Custom {
                event_type: "player.joined".to_owned(),
                data: Map::new(),
            },
        );

        assert_eq!(event.topic(), "player.joined");
    }

    #[test]
    fn test_builder_sets_scope_and_metadata() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let event = GameEvent::new("rule_engine", now, EventPayload::SaveRequested)
            .with_game_id("g1")
            .with_player_id("p1")
            .with_metadata("origin", Value::String("test".to_owned()));

        assert_eq!(event.envelope.game_id.as_deref(), Some("g1"));
        assert_eq!(event.envelope.player_id.as_deref(), Some("p1"));
        assert_eq!(
            event.envelope.metadata.get("origin"),
            Some(&Value::String("test".to_owned()))
        );
    }

    #[test]
    fn test_rule_spec_defaults_on_deserialization() {
        let spec: RuleSpec = serde_json::from_value(serde_json::json!({
            "name": "check_victory",
            "condition": "score >= 100",
            "action": "trigger_victory",
        }))
        .unwrap();

        assert_eq!(spec.priority, 1);
        assert!(spec.enabled);
        assert!(spec.game_id.is_none());
    }
}
