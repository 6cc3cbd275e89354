//! Publish/subscribe bus with one delivery task per subscription.
//!
//! ```text
//!  send(msg) ──lookup msg.to──▶ [Subscription] ──mpsc──▶ delivery task ──▶ listener.on_message
//! ```
//!
//! Every subscription owns an unbounded channel drained by its own task, so
//! a listener sees messages in publish order while different listeners run
//! concurrently. Messages to a destination without subscribers are dropped.

use bitrelay_application::{MessageBus, MessageListener, MessageSender, same_listener};
use bitrelay_domain::Message;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

struct Subscription {
    listener: Arc<dyn MessageListener>,
    tx: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

pub struct InMemoryMessageBus {
    routes: RwLock<HashMap<String, Vec<Subscription>>>,
    runtime: Handle,
    published: AtomicU64,
}

impl InMemoryMessageBus {
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: RwLock::new(HashMap::new()),
            runtime: Handle::current(),
            published: AtomicU64::new(0),
        })
    }

    /// Number of listeners subscribed to `destination`.
    pub fn listener_count(&self, destination: &str) -> usize {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        routes.get(destination).map_or(0, Vec::len)
    }

    /// Number of messages published so far, delivered or not.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl MessageSender for InMemoryMessageBus {
    fn send(&self, message: Message) {
        self.published.fetch_add(1, Ordering::Relaxed);
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        let Some(subscriptions) = routes.get(&message.to) else {
            debug!(
                "[{}] No listener on '{}', dropping {}",
                message.correlation_id.short(),
                message.to,
                message.body.type_name()
            );
            return;
        };
        trace!(
            "[{}] {} -> '{}' ({} listener(s))",
            message.correlation_id.short(),
            message.body.type_name(),
            message.to,
            subscriptions.len()
        );
        for subscription in subscriptions {
            // A closed channel means the subscription is being removed.
            let _ = subscription.tx.send(message.clone());
        }
    }
}

impl MessageBus for InMemoryMessageBus {
    fn add_listener(&self, destination: &str, listener: Arc<dyn MessageListener>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let delivered_to = Arc::clone(&listener);
        let task = self.runtime.spawn(async move {
            while let Some(message) = rx.recv().await {
                delivered_to.on_message(message);
            }
        });

        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        routes
            .entry(destination.to_string())
            .or_default()
            .push(Subscription { listener, tx, task });
        debug!("Listener added on '{}'", destination);
    }

    fn remove_listener(&self, destination: &str, listener: &Arc<dyn MessageListener>) {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        let Some(subscriptions) = routes.get_mut(destination) else {
            return;
        };
        subscriptions.retain(|s| {
            if same_listener(&s.listener, listener) {
                s.task.abort();
                false
            } else {
                true
            }
        });
        if subscriptions.is_empty() {
            routes.remove(destination);
        }
        debug!("Listener removed from '{}'", destination);
    }
}

impl Drop for InMemoryMessageBus {
    fn drop(&mut self) {
        let routes = self.routes.get_mut().unwrap_or_else(|e| e.into_inner());
        for subscription in routes.values().flatten() {
            subscription.task.abort();
        }
    }
}
