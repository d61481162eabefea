//! Route modules, one per context.

pub mod actions;
pub mod chat;
pub mod games;
pub mod health;
pub mod player_state;
pub mod rules;
