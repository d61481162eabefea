//! Playforge Event Bus — topic-based publish/subscribe dispatch.
//!
//! One dispatcher task runs per topic. Events published to a topic are
//! delivered to each of its subscribers in publication order; subscribers
//! of the same event run concurrently, and the dispatcher only advances to
//! the next event once every handler for the current one has completed,
//! failed, or timed out. A subscriber failure becomes a
//! `system.module_error` event and never blocks the topic's queue.

mod bus;
mod config;
mod subscription;

pub use bus::EventBus;
pub use config::BusConfig;
pub use subscription::SubscriptionHandle;
