use bitrelay_application::EventSink;
use bitrelay_domain::{OperationEvent, OperationEventKind};
use tracing::{debug, info, warn};

/// Mirrors operation events to `tracing` at a level matching their kind.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn handle_event(&self, event: OperationEvent) {
        match event.kind {
            OperationEventKind::Failed
            | OperationEventKind::NoContributorFound
            | OperationEventKind::ContributorFailed
            | OperationEventKind::Warning
            | OperationEventKind::TimedOut => warn!(target: "bitrelay::events", "{}", event),
            OperationEventKind::Complete | OperationEventKind::ContributorsSelected => {
                info!(target: "bitrelay::events", "{}", event)
            }
            _ => debug!(target: "bitrelay::events", "{}", event),
        }
    }
}
