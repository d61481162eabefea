//! Shared application state.

use std::sync::Arc;

use playforge_bus::EventBus;
use playforge_core::clock::Clock;
use playforge_runtime::Coordinator;
use playforge_state::StateManager;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The event bus routes publish onto.
    pub bus: EventBus,
    /// Committed state, for read routes.
    pub state: Arc<StateManager>,
    /// The running coordination core.
    pub coordinator: Arc<Coordinator>,
    /// Clock used to stamp published events.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        bus: EventBus,
        state: Arc<StateManager>,
        coordinator: Arc<Coordinator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bus,
            state,
            coordinator,
            clock,
        }
    }
}
