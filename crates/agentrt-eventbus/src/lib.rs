//! In-process publish/subscribe bus — the sequencing substrate every other
//! core runtime component is wired through. One handler list per
//! `EventType`; `publish` spawns a task per (handler, envelope) and does
//! not wait for any of them. No persistence, no redelivery: at-most-once
//! delivery per (handler, envelope). Errors in one handler are logged with
//! the envelope's `trace_id` and never propagate to the publisher or to
//! other handlers.

use std::collections::HashMap;
use std::sync::Arc;

use agentrt_domain::event::{EventEnvelope, EventType};
use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::RwLock;

/// Implemented by anything that wants to react to published events.
/// `handle` must not panic across the bus boundary for unrelated handlers
/// to stay isolated — `EventBus::publish` catches panics per invocation.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, envelope: EventEnvelope);
}

type HandlerList = Vec<Arc<dyn Handler>>;

/// Per-event-type subscriber registry plus `publish`. Subscription is
/// write-rare (done once at startup); reads during publish take a brief
/// read lock and clone the `Arc` list, so concurrent publishes never block
/// each other.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventType, HandlerList>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler for one event type. Handlers are invoked in no
    /// particular order relative to each other.
    pub fn subscribe(&self, event_type: EventType, handler: Arc<dyn Handler>) {
        self.handlers
            .write()
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    /// Dispatch an envelope to every handler registered for its event
    /// type. Spawns one task per handler and returns immediately — the
    /// bus does not wait for handlers to finish, and a handler's own
    /// publishes (if any) are themselves dispatched the same way.
    pub fn publish(&self, envelope: EventEnvelope) {
        let event_type = envelope.event_type();
        let handlers = {
            let guard = self.handlers.read();
            guard.get(&event_type).cloned().unwrap_or_default()
        };

        if handlers.is_empty() {
            tracing::debug!(
                trace_id = %envelope.trace_id,
                ?event_type,
                "published event has no subscribers"
            );
            return;
        }

        for handler in handlers {
            let envelope = envelope.clone();
            let trace_id = envelope.trace_id;
            tokio::spawn(async move {
                let result = std::panic::AssertUnwindSafe(handler.handle(envelope))
                    .catch_unwind()
                    .await;
                if let Err(panic) = result {
                    let message = panic_message(&panic);
                    tracing::error!(%trace_id, %message, "event handler panicked");
                }
            });
        }
    }

    /// Number of handlers registered for a given event type (test/debug
    /// helper, not part of the base spec contract).
    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.handlers
            .read()
            .get(&event_type)
            .map(|l| l.len())
            .unwrap_or(0)
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
