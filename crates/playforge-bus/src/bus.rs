//! The event bus implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use futures::FutureExt;
use playforge_core::clock::Clock;
use playforge_core::error::CoreError;
use playforge_core::event::{
    EventPayload, GameEvent, MODULE_ERROR_TOPIC, ModuleErrorPayload, ORIGIN_EVENT_ID_KEY,
};
use playforge_core::handler::EventHandler;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, trace, warn};

use crate::config::BusConfig;
use crate::subscription::SubscriptionHandle;

struct SubscriberEntry {
    id: u64,
    handler: Arc<dyn EventHandler>,
}

/// An event queued for one topic, addressed to the subscribers that were
/// registered at publish time. Subscribers registered later never see it.
struct QueuedEvent {
    event: GameEvent,
    recipients: Vec<u64>,
}

struct TopicState {
    tx: mpsc::UnboundedSender<QueuedEvent>,
    subscribers: Arc<RwLock<Vec<SubscriberEntry>>>,
    dispatcher: JoinHandle<()>,
}

struct BusInner {
    config: BusConfig,
    clock: Arc<dyn Clock>,
    topics: RwLock<HashMap<String, TopicState>>,
    next_subscriber_id: AtomicU64,
    closed: AtomicBool,
}

/// Topic-based publish/subscribe dispatcher.
///
/// Cloning is cheap; all clones share one bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates a bus with the given configuration and clock.
    #[must_use]
    pub fn new(config: BusConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                config,
                clock,
                topics: RwLock::new(HashMap::new()),
                next_subscriber_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Publishes an event to its topic.
    ///
    /// Returns once the event is enqueued for every current subscriber of
    /// the topic — not once handlers complete. An event published to a
    /// topic with no subscribers is dropped. Delivery is at-least-once;
    /// consumers must tolerate re-delivery of an already-seen `event_id`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Delivery` if the bus has been shut down.
    pub fn publish(&self, event: GameEvent) -> Result<(), CoreError> {
        self.inner.publish(event)
    }

    /// Registers a handler for a topic.
    ///
    /// May be called at any time, including while events are in flight; the
    /// new subscriber only sees events published after registration.
    pub fn subscribe(
        &self,
        topic: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionHandle {
        let topic = topic.into();
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);

        let mut topics = self.inner.topics.write().expect("topic map lock poisoned");
        let state = topics
            .entry(topic.clone())
            .or_insert_with(|| spawn_topic(Arc::downgrade(&self.inner), topic.clone()));
        state
            .subscribers
            .write()
            .expect("subscriber list lock poisoned")
            .push(SubscriberEntry { id, handler });

        SubscriptionHandle {
            topic,
            id,
            registered_at: self.inner.clock.now(),
        }
    }

    /// Removes a subscription. Queued events addressed to it are skipped.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let topics = self.inner.topics.read().expect("topic map lock poisoned");
        if let Some(state) = topics.get(&handle.topic) {
            state
                .subscribers
                .write()
                .expect("subscriber list lock poisoned")
                .retain(|entry| entry.id != handle.id);
        }
    }

    /// Shuts the bus down: abandons undelivered work and fails all
    /// subsequent publishes with a delivery error.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let mut topics = self.inner.topics.write().expect("topic map lock poisoned");
        for (_, state) in topics.drain() {
            state.dispatcher.abort();
        }
    }
}

impl BusInner {
    fn publish(&self, event: GameEvent) -> Result<(), CoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::Delivery("bus is shut down".into()));
        }

        let topic = event.topic().to_owned();
        let topics = self.topics.read().expect("topic map lock poisoned");
        let Some(state) = topics.get(&topic) else {
            trace!(%topic, event_id = %event.envelope.event_id, "no subscribers; dropping event");
            return Ok(());
        };

        let recipients: Vec<u64> = state
            .subscribers
            .read()
            .expect("subscriber list lock poisoned")
            .iter()
            .map(|entry| entry.id)
            .collect();
        if recipients.is_empty() {
            trace!(%topic, event_id = %event.envelope.event_id, "no subscribers; dropping event");
            return Ok(());
        }

        state
            .tx
            .send(QueuedEvent { event, recipients })
            .map_err(|_| CoreError::Delivery(format!("topic '{topic}' dispatcher is gone")))
    }
}

fn spawn_topic(inner: Weak<BusInner>, topic: String) -> TopicState {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscribers: Arc<RwLock<Vec<SubscriberEntry>>> = Arc::new(RwLock::new(Vec::new()));
    let dispatcher = tokio::spawn(run_dispatcher(inner, topic, Arc::clone(&subscribers), rx));
    TopicState {
        tx,
        subscribers,
        dispatcher,
    }
}

/// Per-topic dispatch loop.
///
/// All handlers of one event run concurrently; the loop only advances to
/// the next event once each has completed, failed, or timed out. That is
/// what gives every subscriber the topic's events in publication order.
async fn run_dispatcher(
    inner: Weak<BusInner>,
    topic: String,
    subscribers: Arc<RwLock<Vec<SubscriberEntry>>>,
    mut rx: mpsc::UnboundedReceiver<QueuedEvent>,
) {
    while let Some(queued) = rx.recv().await {
        let timeout = match inner.upgrade() {
            Some(bus) => bus.config.handler_timeout,
            None => return,
        };

        let handlers: Vec<Arc<dyn EventHandler>> = {
            let subs = subscribers.read().expect("subscriber list lock poisoned");
            queued
                .recipients
                .iter()
                .filter_map(|id| {
                    subs.iter()
                        .find(|entry| entry.id == *id)
                        .map(|entry| Arc::clone(&entry.handler))
                })
                .collect()
        };

        let deliveries = handlers
            .into_iter()
            .map(|handler| deliver(handler, &queued.event, timeout));
        let outcomes = futures::future::join_all(deliveries).await;

        let Some(bus) = inner.upgrade() else { return };
        for outcome in outcomes {
            match outcome {
                DeliveryOutcome::Delivered(follow_ups) => {
                    for follow_up in follow_ups {
                        if let Err(err) = bus.publish(follow_up) {
                            warn!(%topic, %err, "failed to publish follow-up event");
                        }
                    }
                }
                DeliveryOutcome::Failed { handler, error } => {
                    report_failure(&bus, &topic, &queued.event, &handler, &error);
                }
            }
        }
    }
}

enum DeliveryOutcome {
    Delivered(Vec<GameEvent>),
    Failed { handler: String, error: CoreError },
}

async fn deliver(
    handler: Arc<dyn EventHandler>,
    event: &GameEvent,
    timeout: Duration,
) -> DeliveryOutcome {
    let name = handler.name().to_owned();
    let invocation = std::panic::AssertUnwindSafe(handler.handle(event)).catch_unwind();

    match tokio::time::timeout(timeout, invocation).await {
        Err(_) => DeliveryOutcome::Failed {
            handler: name,
            error: CoreError::Delivery(format!("handler timed out after {timeout:?}")),
        },
        Ok(Err(panic)) => DeliveryOutcome::Failed {
            handler: name,
            error: CoreError::Delivery(format!("handler panicked: {}", panic_message(&panic))),
        },
        Ok(Ok(Err(error))) => DeliveryOutcome::Failed {
            handler: name,
            error,
        },
        Ok(Ok(Ok(follow_ups))) => DeliveryOutcome::Delivered(follow_ups),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

/// Converts a delivery failure into a `system.module_error` event.
///
/// Failures of handlers on the error topic itself are only logged, so a
/// broken error consumer cannot feed the bus an event loop.
fn report_failure(
    bus: &Arc<BusInner>,
    topic: &str,
    origin: &GameEvent,
    handler: &str,
    error: &CoreError,
) {
    error!(%topic, handler, %error, origin_event_id = %origin.envelope.event_id, "event delivery failed");
    if topic == MODULE_ERROR_TOPIC {
        return;
    }

    let mut event = GameEvent::new(
        handler,
        bus.clock.now(),
        EventPayload::ModuleError(ModuleErrorPayload {
            source_module: handler.to_owned(),
            error: format!("event delivery failed on topic '{topic}'"),
            exception: error.to_string(),
        }),
    )
    .with_metadata(
        ORIGIN_EVENT_ID_KEY,
        Value::String(origin.envelope.event_id.to_string()),
    );
    if let Some(game_id) = &origin.envelope.game_id {
        event = event.with_game_id(game_id.clone());
    }
    if let Some(player_id) = &origin.envelope.player_id {
        event = event.with_player_id(player_id.clone());
    }

    if let Err(err) = bus.publish(event) {
        warn!(%topic, %err, "failed to publish module error event");
    }
}
