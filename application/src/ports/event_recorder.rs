//! Port for persisting operation events.
//!
//! This is separate from `tracing`-based logs: tracing carries human
//! readable diagnostics, while a recorder keeps every [`OperationEvent`] in a
//! machine-readable form (e.g. JSONL) as audit history.

use bitrelay_domain::OperationEvent;

/// Persists operation events.
///
/// `record` is synchronous and infallible; recording failures are logged by
/// the implementation and otherwise ignored.
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: &OperationEvent);
}

/// No-op implementation for tests and when recording is disabled.
pub struct NoEventRecorder;

impl EventRecorder for NoEventRecorder {
    fn record(&self, _event: &OperationEvent) {}
}
