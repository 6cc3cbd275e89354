//! Blocking convenience around the event sink.
//!
//! The engine never waits for results. Callers that want to can hand a
//! [`BlockingEventSink`] to a conversation and await its terminal event.

use crate::ports::event_sink::EventSink;
use bitrelay_domain::OperationEvent;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Collects every event and remembers the terminal one.
pub struct BlockingEventSink {
    events: Mutex<Vec<OperationEvent>>,
    terminal: watch::Sender<Option<OperationEvent>>,
    forward: Option<Arc<dyn EventSink>>,
}

impl BlockingEventSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            terminal: watch::Sender::new(None),
            forward: None,
        }
    }

    /// Also forwards every event to `sink`, before recording it.
    pub fn forwarding_to(sink: Arc<dyn EventSink>) -> Self {
        Self {
            forward: Some(sink),
            ..Self::new()
        }
    }

    /// Events received so far, in arrival order.
    pub fn events(&self) -> Vec<OperationEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The terminal event, if it has arrived.
    pub fn finish_event(&self) -> Option<OperationEvent> {
        self.terminal.borrow().clone()
    }

    /// Waits until a `Complete`, `Failed` or `NoContributorFound` event
    /// arrives. Returns `None` on timeout.
    pub async fn wait_for_finish(&self, timeout: Duration) -> Option<OperationEvent> {
        let mut rx = self.terminal.subscribe();
        let result = tokio::time::timeout(timeout, rx.wait_for(|event| event.is_some())).await;
        match result {
            Ok(Ok(event)) => event.clone(),
            _ => None,
        }
    }
}

impl Default for BlockingEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BlockingEventSink {
    fn handle_event(&self, event: OperationEvent) {
        if let Some(forward) = &self.forward {
            forward.handle_event(event.clone());
        }
        let terminal = event.is_terminal();
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        if terminal {
            self.terminal.send_replace(Some(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitrelay_domain::{CorrelationId, OperationEventKind, OperationKind};

    fn event(kind: OperationEventKind) -> OperationEvent {
        OperationEvent::new(kind, CorrelationId::new("c"), OperationKind::GetFileIds, "col", "")
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_terminal_event() {
        let sink = Arc::new(BlockingEventSink::new());
        let producer = sink.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            producer.handle_event(event(OperationEventKind::Progress));
            producer.handle_event(event(OperationEventKind::Complete));
        });

        let terminal = sink.wait_for_finish(Duration::from_secs(10)).await.unwrap();
        assert_eq!(terminal.kind, OperationEventKind::Complete);
        assert_eq!(sink.events().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_without_terminal_event() {
        let sink = BlockingEventSink::new();
        sink.handle_event(event(OperationEventKind::TimedOut));
        assert!(sink.wait_for_finish(Duration::from_secs(5)).await.is_none());
        assert!(sink.finish_event().is_none());
    }

    #[tokio::test]
    async fn test_wait_after_finish_returns_immediately() {
        let sink = BlockingEventSink::new();
        sink.handle_event(event(OperationEventKind::NoContributorFound));
        let terminal = sink.wait_for_finish(Duration::from_millis(1)).await.unwrap();
        assert_eq!(terminal.kind, OperationEventKind::NoContributorFound);
    }
}
