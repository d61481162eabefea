//! Playforge Rules — prioritized, scoped conditional rules.
//!
//! Rules carry a boolean condition over an evaluation context, expressed
//! in a restricted grammar (comparisons, boolean connectives, arithmetic,
//! field lookups) with no access to anything outside the context. The
//! engine is pure: it evaluates and returns outcomes, and never touches
//! the bus — the runtime crate does the wiring.

mod condition;
mod engine;
mod rule;

pub use condition::{ConditionError, evaluate_condition};
pub use engine::{Outcome, RuleEngine};
pub use rule::{Rule, RuleScope};
