//! Playforge Chat — personality-driven chat sessions.
//!
//! Consumes the core's `TextGenerator` trait only; the generative backend
//! itself stays outside this crate, and the rule/state core never touches
//! any of this.

mod config;
mod offline;
mod session;

pub use config::{ChatbotConfig, Personality};
pub use offline::OfflineGenerator;
pub use session::{ChatMessage, ChatSession, Role};
