//! Test handlers — mock `EventHandler` implementations for bus tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use playforge_core::error::CoreError;
use playforge_core::event::GameEvent;
use playforge_core::handler::EventHandler;
use tokio::sync::mpsc;

/// A handler that records every delivered event and forwards it on a
/// channel so tests can await delivery instead of sleeping.
#[derive(Debug)]
pub struct CollectingHandler {
    name: String,
    seen: Mutex<Vec<GameEvent>>,
    tx: mpsc::UnboundedSender<GameEvent>,
}

impl CollectingHandler {
    /// Creates a collecting handler and the receiver side of its channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<GameEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                name: name.into(),
                seen: Mutex::new(Vec::new()),
                tx,
            }),
            rx,
        )
    }

    /// Returns all events delivered so far, in delivery order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn seen(&self) -> Vec<GameEvent> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for CollectingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &GameEvent) -> Result<Vec<GameEvent>, CoreError> {
        self.seen.lock().unwrap().push(event.clone());
        // Receiver may already be dropped when a test only cares about `seen`.
        let _ = self.tx.send(event.clone());
        Ok(Vec::new())
    }
}

/// A handler that fails every delivery.
#[derive(Debug)]
pub struct FailingHandler {
    name: String,
}

impl FailingHandler {
    /// Creates a failing handler.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into() })
    }
}

#[async_trait]
impl EventHandler for FailingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _event: &GameEvent) -> Result<Vec<GameEvent>, CoreError> {
        Err(CoreError::Delivery("handler exploded".into()))
    }
}

/// A handler that never completes within any reasonable timeout.
#[derive(Debug)]
pub struct StallingHandler {
    name: String,
}

impl StallingHandler {
    /// Creates a stalling handler.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into() })
    }
}

#[async_trait]
impl EventHandler for StallingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _event: &GameEvent) -> Result<Vec<GameEvent>, CoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}
