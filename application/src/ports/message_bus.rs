//! Message transport ports.
//!
//! The engine talks to contributors only through these traits. Delivery is
//! asynchronous and at-least-once at best: `send` is fire-and-forget and a
//! listener may be invoked from any thread, concurrently for different
//! messages.

use bitrelay_domain::Message;
use std::sync::Arc;

/// Outbound half of the transport.
pub trait MessageSender: Send + Sync {
    /// Publish a message to `message.to`.
    ///
    /// Never blocks on delivery and never reports delivery failures.
    fn send(&self, message: Message);
}

/// Receives messages published to a destination.
///
/// Implementations must return quickly; they run on the delivery path.
pub trait MessageListener: Send + Sync {
    fn on_message(&self, message: Message);
}

/// Publish/subscribe transport: sending plus listener registration.
pub trait MessageBus: MessageSender {
    /// Subscribe `listener` to every message published to `destination`.
    fn add_listener(&self, destination: &str, listener: Arc<dyn MessageListener>);

    /// Remove a listener previously added for `destination`.
    ///
    /// Listeners are compared by identity.
    fn remove_listener(&self, destination: &str, listener: &Arc<dyn MessageListener>);
}

/// True when both handles point at the same listener instance.
pub fn same_listener(a: &Arc<dyn MessageListener>, b: &Arc<dyn MessageListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
