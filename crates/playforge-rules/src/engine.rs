//! The rule engine.

use std::collections::HashMap;

use playforge_core::error::CoreError;
use serde_json::{Map, Value};
use tracing::debug;

use crate::condition::{ConditionError, evaluate_condition};
use crate::rule::{Rule, RuleScope};

/// The result of evaluating one rule.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The condition evaluated to true.
    Triggered {
        /// Name of the rule.
        rule_name: String,
        /// The rule's action label.
        action: String,
        /// Condition text, action label, and the evaluated context.
        details: Map<String, Value>,
    },
    /// The condition failed to evaluate; other rules are unaffected.
    Failed {
        /// Name of the rule.
        rule_name: String,
        /// Why evaluation failed.
        error: ConditionError,
    },
}

/// Prioritized, scoped rule evaluator.
///
/// The engine is pure: `evaluate` inspects rules and the given context,
/// returns outcomes, and publishes nothing. Construct one per deployment
/// (or per test) and inject it where it is needed.
#[derive(Debug, Default)]
pub struct RuleEngine {
    global_rules: Vec<Rule>,
    game_rules: HashMap<String, Vec<Rule>>,
}

impl RuleEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn scope_rules(&self, scope: &RuleScope) -> Option<&Vec<Rule>> {
        match scope {
            RuleScope::Global => Some(&self.global_rules),
            RuleScope::Game(game_id) => self.game_rules.get(game_id),
        }
    }

    /// Appends a rule to its scope's list.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if an enabled rule with the same
    /// name already exists in the scope and the new rule is also enabled.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), CoreError> {
        if rule.enabled
            && self
                .scope_rules(&rule.scope)
                .is_some_and(|rules| rules.iter().any(|r| r.enabled && r.name == rule.name))
        {
            return Err(CoreError::Validation(format!(
                "an enabled rule named '{}' already exists in this scope",
                rule.name
            )));
        }

        debug!(rule_name = %rule.name, priority = rule.priority, "rule added");
        match rule.scope.clone() {
            RuleScope::Global => self.global_rules.push(rule),
            RuleScope::Game(game_id) => self.game_rules.entry(game_id).or_default().push(rule),
        }
        Ok(())
    }

    /// Enables or disables a rule by scope and name.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` if no rule with that name exists in
    /// the scope.
    pub fn set_enabled(
        &mut self,
        scope: &RuleScope,
        name: &str,
        enabled: bool,
    ) -> Result<(), CoreError> {
        let rules = match scope {
            RuleScope::Global => Some(&mut self.global_rules),
            RuleScope::Game(game_id) => self.game_rules.get_mut(game_id),
        };
        let rule = rules
            .and_then(|rules| rules.iter_mut().find(|r| r.name == name))
            .ok_or_else(|| CoreError::NotFound(format!("no rule named '{name}' in scope")))?;
        rule.enabled = enabled;
        Ok(())
    }

    /// Evaluates all applicable rules for a game against a context.
    ///
    /// Candidates are the global rules plus the rules scoped to `game_id`,
    /// filtered to enabled, in descending priority; rules of equal
    /// priority keep their insertion order. A failing condition yields an
    /// error outcome for that rule only. Outcomes are returned in
    /// evaluation order.
    #[must_use]
    pub fn evaluate(&self, game_id: &str, context: &Map<String, Value>) -> Vec<Outcome> {
        let mut candidates: Vec<&Rule> = self
            .global_rules
            .iter()
            .chain(self.game_rules.get(game_id).into_iter().flatten())
            .filter(|rule| rule.enabled)
            .collect();
        // Stable sort: equal priorities keep insertion order.
        candidates.sort_by_key(|rule| std::cmp::Reverse(rule.priority));

        candidates
            .into_iter()
            .filter_map(|rule| match evaluate_condition(&rule.condition, context) {
                Ok(true) => {
                    debug!(rule_name = %rule.name, action = %rule.action, "rule triggered");
                    let mut details = Map::new();
                    details.insert(
                        "condition".to_owned(),
                        Value::String(rule.condition.clone()),
                    );
                    details.insert("action".to_owned(), Value::String(rule.action.clone()));
                    details.insert("context".to_owned(), Value::Object(context.clone()));
                    Some(Outcome::Triggered {
                        rule_name: rule.name.clone(),
                        action: rule.action.clone(),
                        details,
                    })
                }
                Ok(false) => None,
                Err(error) => {
                    debug!(rule_name = %rule.name, %error, "rule evaluation failed");
                    Some(Outcome::Failed {
                        rule_name: rule.name.clone(),
                        error,
                    })
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(name: &str, condition: &str, priority: i32) -> Rule {
        Rule {
            name: name.to_owned(),
            condition: condition.to_owned(),
            action: format!("action_{name}"),
            priority,
            enabled: true,
            scope: RuleScope::Global,
        }
    }

    fn context(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn outcome_names(outcomes: &[Outcome]) -> Vec<String> {
        outcomes
            .iter()
            .map(|o| match o {
                Outcome::Triggered { rule_name, .. } | Outcome::Failed { rule_name, .. } => {
                    rule_name.clone()
                }
            })
            .collect()
    }

    #[test]
    fn test_priority_order_with_stable_ties() {
        // Arrange — A and B share a priority; C outranks both.
        let mut engine = RuleEngine::new();
        engine.add_rule(rule("a", "true", 5)).unwrap();
        engine.add_rule(rule("b", "true", 5)).unwrap();
        engine.add_rule(rule("c", "true", 9)).unwrap();

        // Act
        let outcomes = engine.evaluate("g1", &context(json!({})));

        // Assert — descending priority, insertion order on ties.
        assert_eq!(outcome_names(&outcomes), ["c", "a", "b"]);
    }

    #[test]
    fn test_disabled_rule_never_triggers() {
        // Arrange
        let mut engine = RuleEngine::new();
        let mut disabled = rule("sleeper", "true", 10);
        disabled.enabled = false;
        engine.add_rule(disabled).unwrap();

        // Act
        let outcomes = engine.evaluate("g1", &context(json!({})));

        // Assert
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_failing_condition_does_not_suppress_other_rules() {
        // Arrange — the first rule references an undefined field.
        let mut engine = RuleEngine::new();
        engine.add_rule(rule("broken", "undefined_field > 0", 5)).unwrap();
        engine.add_rule(rule("victory", "score >= 100", 1)).unwrap();

        // Act
        let outcomes = engine.evaluate("g1", &context(json!({"score": 150})));

        // Assert — [error(broken), triggered(victory)].
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            &outcomes[0],
            Outcome::Failed { rule_name, .. } if rule_name == "broken"
        ));
        assert!(matches!(
            &outcomes[1],
            Outcome::Triggered { rule_name, .. } if rule_name == "victory"
        ));
    }

    #[test]
    fn test_victory_rule_triggers_exactly_once_at_threshold() {
        // Arrange
        let mut engine = RuleEngine::new();
        engine
            .add_rule(rule("check_victory", "score >= 100", 10))
            .unwrap();

        // Act
        let outcomes = engine.evaluate("g1", &context(json!({"score": 100})));

        // Assert
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            Outcome::Triggered {
                rule_name, details, ..
            } => {
                assert_eq!(rule_name, "check_victory");
                assert_eq!(details["condition"], json!("score >= 100"));
                assert_eq!(details["context"]["score"], json!(100));
            }
            other => panic!("expected Triggered, got {other:?}"),
        }
    }

    #[test]
    fn test_game_scoped_rules_apply_only_to_their_game() {
        // Arrange
        let mut engine = RuleEngine::new();
        let mut scoped = rule("trap", "true", 1);
        scoped.scope = RuleScope::Game("g1".to_owned());
        engine.add_rule(scoped).unwrap();

        // Act & Assert
        assert_eq!(engine.evaluate("g1", &context(json!({}))).len(), 1);
        assert!(engine.evaluate("g2", &context(json!({}))).is_empty());
    }

    #[test]
    fn test_duplicate_active_name_in_scope_is_rejected() {
        // Arrange
        let mut engine = RuleEngine::new();
        engine.add_rule(rule("dup", "true", 1)).unwrap();

        // Act
        let result = engine.add_rule(rule("dup", "false", 2));

        // Assert
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_duplicate_name_is_allowed_when_existing_rule_is_disabled() {
        // Arrange
        let mut engine = RuleEngine::new();
        engine.add_rule(rule("dup", "true", 1)).unwrap();
        engine
            .set_enabled(&RuleScope::Global, "dup", false)
            .unwrap();

        // Act & Assert — the name is free again once its holder is inactive.
        engine.add_rule(rule("dup", "false", 2)).unwrap();
    }

    #[test]
    fn test_same_name_in_different_scopes_is_allowed() {
        // Arrange
        let mut engine = RuleEngine::new();
        engine.add_rule(rule("shared", "true", 1)).unwrap();
        let mut scoped = rule("shared", "true", 1);
        scoped.scope = RuleScope::Game("g1".to_owned());

        // Act & Assert
        engine.add_rule(scoped).unwrap();
    }

    #[test]
    fn test_set_enabled_on_missing_rule_is_not_found() {
        let mut engine = RuleEngine::new();
        let result = engine.set_enabled(&RuleScope::Global, "ghost", true);
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[test]
    fn test_re_enabled_rule_participates_again() {
        // Arrange
        let mut engine = RuleEngine::new();
        engine.add_rule(rule("toggler", "true", 1)).unwrap();
        engine
            .set_enabled(&RuleScope::Global, "toggler", false)
            .unwrap();
        assert!(engine.evaluate("g1", &context(json!({}))).is_empty());

        // Act
        engine
            .set_enabled(&RuleScope::Global, "toggler", true)
            .unwrap();

        // Assert
        assert_eq!(engine.evaluate("g1", &context(json!({}))).len(), 1);
    }
}
