//! Standing reactions that drive rule evaluation from bus events.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use playforge_core::error::CoreError;
use playforge_core::event::{
    EventPayload, GameEvent, ModuleErrorPayload, RuleTriggeredPayload,
};
use playforge_core::handler::EventHandler;
use playforge_rules::{Outcome, Rule, RuleEngine};
use serde_json::{Map, Value, json};
use tracing::debug;

const SOURCE: &str = "rule_engine";

/// Builds the evaluation context: ambient fields first, then the event's
/// own mapping spread at the top level so its keys take precedence over
/// same-named ambient fields.
fn build_context(
    ambient: Vec<(&str, Value)>,
    spread: &Map<String, Value>,
) -> Map<String, Value> {
    let mut context = Map::new();
    for (field, value) in ambient {
        context.insert(field.to_owned(), value);
    }
    for (field, value) in spread {
        context.insert(field.clone(), value.clone());
    }
    context
}

fn epoch_seconds(timestamp: DateTime<Utc>) -> Value {
    json!(timestamp.timestamp())
}

/// Converts evaluation outcomes into bus events: one `rules.triggered`
/// per triggered rule, one `system.module_error` per failed rule.
fn outcome_events(
    outcomes: Vec<Outcome>,
    event: &GameEvent,
    game_id: &str,
) -> Vec<GameEvent> {
    let timestamp = event.envelope.timestamp;
    outcomes
        .into_iter()
        .map(|outcome| {
            let follow_up = match outcome {
                Outcome::Triggered {
                    rule_name,
                    action,
                    details,
                } => GameEvent::new(
                    SOURCE,
                    timestamp,
                    EventPayload::RuleTriggered(RuleTriggeredPayload {
                        rule_name,
                        action,
                        details,
                    }),
                ),
                Outcome::Failed { rule_name, error } => GameEvent::new(
                    SOURCE,
                    timestamp,
                    EventPayload::ModuleError(ModuleErrorPayload {
                        source_module: SOURCE.to_owned(),
                        error: format!("rule evaluation failed: {rule_name}"),
                        exception: error.to_string(),
                    }),
                ),
            };
            let follow_up = follow_up.with_game_id(game_id.to_owned());
            match &event.envelope.player_id {
                Some(player_id) => follow_up.with_player_id(player_id.clone()),
                None => follow_up,
            }
        })
        .collect()
}

/// Evaluates rules whenever a state record changes.
pub struct StateChangeRulesHandler {
    rules: Arc<RwLock<RuleEngine>>,
}

impl StateChangeRulesHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(rules: Arc<RwLock<RuleEngine>>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl EventHandler for StateChangeRulesHandler {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn handle(&self, event: &GameEvent) -> Result<Vec<GameEvent>, CoreError> {
        let EventPayload::StateChanged(payload) = &event.payload else {
            return Ok(Vec::new());
        };
        let Some(game_id) = &event.envelope.game_id else {
            return Ok(Vec::new());
        };

        let context = build_context(
            vec![
                ("state", Value::Object(payload.new_state.clone())),
                (
                    "old_state",
                    Value::Object(payload.old_state.clone().unwrap_or_default()),
                ),
                (
                    "player_id",
                    event
                        .envelope
                        .player_id
                        .clone()
                        .map_or(Value::Null, Value::String),
                ),
                ("timestamp", epoch_seconds(event.envelope.timestamp)),
            ],
            &payload.new_state,
        );

        let outcomes = self
            .rules
            .read()
            .expect("rule engine lock poisoned")
            .evaluate(game_id, &context);
        debug!(%game_id, outcomes = outcomes.len(), "evaluated rules on state change");
        Ok(outcome_events(outcomes, event, game_id))
    }
}

/// Evaluates rules directly against player actions.
pub struct PlayerActionRulesHandler {
    rules: Arc<RwLock<RuleEngine>>,
}

impl PlayerActionRulesHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(rules: Arc<RwLock<RuleEngine>>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl EventHandler for PlayerActionRulesHandler {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn handle(&self, event: &GameEvent) -> Result<Vec<GameEvent>, CoreError> {
        let EventPayload::PlayerAction(payload) = &event.payload else {
            return Ok(Vec::new());
        };
        let Some(game_id) = &event.envelope.game_id else {
            return Ok(Vec::new());
        };

        let context = build_context(
            vec![
                ("action", Value::Object(payload.action.clone())),
                (
                    "player_id",
                    event
                        .envelope
                        .player_id
                        .clone()
                        .map_or(Value::Null, Value::String),
                ),
                ("timestamp", epoch_seconds(event.envelope.timestamp)),
            ],
            &payload.action,
        );

        let outcomes = self
            .rules
            .read()
            .expect("rule engine lock poisoned")
            .evaluate(game_id, &context);
        debug!(%game_id, outcomes = outcomes.len(), "evaluated rules on player action");
        Ok(outcome_events(outcomes, event, game_id))
    }
}

/// Registers rules arriving on the bus.
pub struct AddRuleHandler {
    rules: Arc<RwLock<RuleEngine>>,
}

impl AddRuleHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(rules: Arc<RwLock<RuleEngine>>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl EventHandler for AddRuleHandler {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn handle(&self, event: &GameEvent) -> Result<Vec<GameEvent>, CoreError> {
        let EventPayload::RuleAdd(spec) = &event.payload else {
            return Ok(Vec::new());
        };

        // A duplicate active name surfaces through the bus error path.
        self.rules
            .write()
            .expect("rule engine lock poisoned")
            .add_rule(Rule::from(spec.clone()))?;
        debug!(rule_name = %spec.name, "rule registered from bus");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use playforge_core::event::{PlayerActionPayload, RuleSpec, StateChangedPayload};
    use playforge_rules::RuleScope;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn engine_with(rules: Vec<Rule>) -> Arc<RwLock<RuleEngine>> {
        let mut engine = RuleEngine::new();
        for rule in rules {
            engine.add_rule(rule).unwrap();
        }
        Arc::new(RwLock::new(engine))
    }

    fn victory_rule() -> Rule {
        Rule {
            name: "check_victory".to_owned(),
            condition: "score >= 100".to_owned(),
            action: "trigger_victory".to_owned(),
            priority: 10,
            enabled: true,
            scope: RuleScope::Global,
        }
    }

    fn state_changed_event(new_state: Value) -> GameEvent {
        let Value::Object(new_state) = new_state else {
            panic!("state must be an object");
        };
        GameEvent::new(
            "state_service",
            now(),
            EventPayload::StateChanged(StateChangedPayload {
                state_key: "g1:p1".to_owned(),
                old_state: None,
                new_state,
            }),
        )
        .with_game_id("g1")
        .with_player_id("p1")
    }

    #[tokio::test]
    async fn test_state_change_triggers_matching_rule() {
        // Arrange
        let handler = StateChangeRulesHandler::new(engine_with(vec![victory_rule()]));
        let event = state_changed_event(json!({"score": 150}));

        // Act
        let follow_ups = handler.handle(&event).await.unwrap();

        // Assert
        assert_eq!(follow_ups.len(), 1);
        match &follow_ups[0].payload {
            EventPayload::RuleTriggered(payload) => {
                assert_eq!(payload.rule_name, "check_victory");
                assert_eq!(payload.action, "trigger_victory");
                assert_eq!(payload.details["condition"], json!("score >= 100"));
                assert_eq!(payload.details["context"]["score"], json!(150));
            }
            other => panic!("expected RuleTriggered, got {other:?}"),
        }
        assert_eq!(follow_ups[0].envelope.game_id.as_deref(), Some("g1"));
    }

    #[tokio::test]
    async fn test_context_spreads_state_over_ambient_fields() {
        // Arrange — a rule reading both a spread field and an ambient one.
        let rule = Rule {
            name: "inspect".to_owned(),
            condition: "score >= 1 && timestamp > 0 && old_state == old_state".to_owned(),
            action: "noop".to_owned(),
            priority: 1,
            enabled: true,
            scope: RuleScope::Global,
        };
        let handler = StateChangeRulesHandler::new(engine_with(vec![rule]));

        // Act
        let follow_ups = handler
            .handle(&state_changed_event(json!({"score": 5})))
            .await
            .unwrap();

        // Assert
        assert_eq!(follow_ups.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_rule_becomes_module_error_event() {
        // Arrange
        let broken = Rule {
            name: "broken".to_owned(),
            condition: "missing_field > 0".to_owned(),
            action: "noop".to_owned(),
            priority: 5,
            enabled: true,
            scope: RuleScope::Global,
        };
        let handler = StateChangeRulesHandler::new(engine_with(vec![broken, victory_rule()]));

        // Act
        let follow_ups = handler
            .handle(&state_changed_event(json!({"score": 150})))
            .await
            .unwrap();

        // Assert — error for the broken rule, trigger for the healthy one.
        assert_eq!(follow_ups.len(), 2);
        match &follow_ups[0].payload {
            EventPayload::ModuleError(payload) => {
                assert_eq!(payload.source_module, "rule_engine");
                assert!(payload.error.contains("broken"));
            }
            other => panic!("expected ModuleError, got {other:?}"),
        }
        assert!(matches!(
            &follow_ups[1].payload,
            EventPayload::RuleTriggered(_)
        ));
    }

    #[tokio::test]
    async fn test_player_action_context_uses_action_fields() {
        // Arrange
        let rule = Rule {
            name: "sprint".to_owned(),
            condition: "type == 'move' && action.type == 'move'".to_owned(),
            action: "animate".to_owned(),
            priority: 1,
            enabled: true,
            scope: RuleScope::Global,
        };
        let handler = PlayerActionRulesHandler::new(engine_with(vec![rule]));
        let mut action = Map::new();
        action.insert("type".to_owned(), json!("move"));
        let event = GameEvent::new(
            "gateway",
            now(),
            EventPayload::PlayerAction(PlayerActionPayload { action }),
        )
        .with_game_id("g1")
        .with_player_id("p1");

        // Act
        let follow_ups = handler.handle(&event).await.unwrap();

        // Assert
        assert_eq!(follow_ups.len(), 1);
    }

    #[tokio::test]
    async fn test_add_rule_handler_registers_rule() {
        // Arrange
        let engine = engine_with(Vec::new());
        let handler = AddRuleHandler::new(Arc::clone(&engine));
        let event = GameEvent::new(
            "gateway",
            now(),
            EventPayload::RuleAdd(RuleSpec {
                name: "fresh".to_owned(),
                condition: "score > 0".to_owned(),
                action: "noop".to_owned(),
                priority: 1,
                enabled: true,
                game_id: None,
            }),
        );

        // Act
        handler.handle(&event).await.unwrap();

        // Assert
        let outcomes = engine
            .read()
            .unwrap()
            .evaluate("g1", &serde_json::from_value(json!({"score": 3})).unwrap());
        assert_eq!(outcomes.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_rule_add_fails_through_error_path() {
        // Arrange
        let engine = engine_with(vec![victory_rule()]);
        let handler = AddRuleHandler::new(engine);
        let event = GameEvent::new(
            "gateway",
            now(),
            EventPayload::RuleAdd(RuleSpec {
                name: "check_victory".to_owned(),
                condition: "true".to_owned(),
                action: "noop".to_owned(),
                priority: 1,
                enabled: true,
                game_id: None,
            }),
        );

        // Act
        let result = handler.handle(&event).await;

        // Assert
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
}
