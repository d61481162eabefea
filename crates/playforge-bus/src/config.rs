//! Bus configuration.

use std::time::Duration;

/// Tunables for the event bus.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Upper bound on a single handler invocation. A handler still running
    /// at the deadline is treated as a delivery failure and reported on the
    /// error topic; the topic's queue keeps moving.
    pub handler_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(5),
        }
    }
}
