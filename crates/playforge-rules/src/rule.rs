//! The rule model.

use playforge_core::event::RuleSpec;
use serde::{Deserialize, Serialize};

/// Where a rule applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleScope {
    /// Applies to every game.
    Global,
    /// Applies to one game only.
    Game(String),
}

/// A conditional rule.
///
/// Rules are append-only within their scope; disabling mutates `enabled`,
/// never removes the rule during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Name, unique among enabled rules within the scope.
    pub name: String,
    /// Boolean condition expression over the evaluation context.
    pub condition: String,
    /// Opaque action label interpreted by downstream consumers.
    pub action: String,
    /// Evaluation priority; higher evaluates first.
    pub priority: i32,
    /// Whether the rule participates in evaluation.
    pub enabled: bool,
    /// The rule's scope.
    pub scope: RuleScope,
}

impl From<RuleSpec> for Rule {
    fn from(spec: RuleSpec) -> Self {
        Self {
            name: spec.name,
            condition: spec.condition,
            action: spec.action,
            priority: spec.priority,
            enabled: spec.enabled,
            scope: spec.game_id.map_or(RuleScope::Global, RuleScope::Game),
        }
    }
}
