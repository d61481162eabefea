//! Subscription handles.

use chrono::{DateTime, Utc};

/// Handle returned by [`EventBus::subscribe`](crate::EventBus::subscribe).
///
/// Pass it back to [`EventBus::unsubscribe`](crate::EventBus::unsubscribe)
/// to dispose of the subscription. Dropping the handle does not
/// unsubscribe.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    /// The subscribed topic.
    pub topic: String,
    /// Bus-assigned subscriber id, unique per bus instance.
    pub id: u64,
    /// When the subscription was registered.
    pub registered_at: DateTime<Utc>,
}
