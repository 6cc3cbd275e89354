//! Event sink port
//!
//! The single callback through which a conversation reports its lifecycle
//! to the caller.

use bitrelay_domain::OperationEvent;
use std::sync::Arc;

/// Receives the [`OperationEvent`]s of one or more conversations.
///
/// Called from a dedicated dispatch task, never from the message delivery
/// path, so implementations may block. Events of one conversation arrive in
/// emission order.
pub trait EventSink: Send + Sync {
    fn handle_event(&self, event: OperationEvent);
}

/// No-op sink for when nobody listens.
pub struct NoEventSink;

impl EventSink for NoEventSink {
    fn handle_event(&self, _event: OperationEvent) {}
}

/// A sink that forwards every event to several sinks in order.
pub struct CompositeEventSink {
    delegates: Vec<Arc<dyn EventSink>>,
}

impl CompositeEventSink {
    pub fn new(delegates: Vec<Arc<dyn EventSink>>) -> Self {
        Self { delegates }
    }
}

impl EventSink for CompositeEventSink {
    fn handle_event(&self, event: OperationEvent) {
        if let Some((last, rest)) = self.delegates.split_last() {
            for d in rest {
                d.handle_event(event.clone());
            }
            last.handle_event(event);
        }
    }
}
