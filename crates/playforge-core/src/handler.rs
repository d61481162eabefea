//! Event handler abstraction.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::event::GameEvent;

/// A bus subscriber's handler.
///
/// Handlers receive each delivered event and return zero or more follow-up
/// events; the bus publishes the returned events as new, independent
/// publishes. Returning an error (or exceeding the bus's handler timeout)
/// is a delivery failure for this subscriber only — other subscribers and
/// subsequent events are unaffected.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name used in logs and module-error events.
    fn name(&self) -> &str;

    /// Handles one delivered event.
    async fn handle(&self, event: &GameEvent) -> Result<Vec<GameEvent>, CoreError>;
}
