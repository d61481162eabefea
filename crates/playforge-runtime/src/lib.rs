//! Playforge Runtime — the event-driven wiring.
//!
//! The bus, state manager, and rule engine are each independently usable;
//! this crate composes them into the end-to-end behavior: player actions
//! become state deltas, state deltas become `state.changed` events, and
//! state changes (and the actions themselves) drive rule evaluation whose
//! outcomes go back onto the bus.

mod chat_reactions;
mod coordinator;
mod rule_reactions;
mod state_reactions;

pub use chat_reactions::ChatMessageHandler;
pub use coordinator::Coordinator;
pub use rule_reactions::{AddRuleHandler, PlayerActionRulesHandler, StateChangeRulesHandler};
pub use state_reactions::{GameCreatedHandler, PlayerActionStateHandler, SaveRequestHandler};
