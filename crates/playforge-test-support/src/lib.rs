//! Shared test mocks and utilities for the Playforge engine.

mod clock;
mod generator;
mod handler;
mod store;

pub use clock::FixedClock;
pub use generator::{FailingGenerator, ScriptedGenerator};
pub use handler::{CollectingHandler, FailingHandler, StallingHandler};
pub use store::{FailingStore, RecordingStore};
