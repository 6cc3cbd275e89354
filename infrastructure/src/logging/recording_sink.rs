use bitrelay_application::{EventRecorder, EventSink};
use bitrelay_domain::OperationEvent;
use std::sync::Arc;

/// Records every event before handing it to the wrapped sink.
pub struct RecordingEventSink {
    recorder: Arc<dyn EventRecorder>,
    inner: Arc<dyn EventSink>,
}

impl RecordingEventSink {
    pub fn new(recorder: Arc<dyn EventRecorder>, inner: Arc<dyn EventSink>) -> Self {
        Self { recorder, inner }
    }
}

impl EventSink for RecordingEventSink {
    fn handle_event(&self, event: OperationEvent) {
        self.recorder.record(&event);
        self.inner.handle_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitrelay_domain::{CorrelationId, OperationEventKind, OperationKind};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl EventRecorder for Log {
        fn record(&self, event: &OperationEvent) {
            self.0.lock().unwrap().push(format!("record {}", event.kind));
        }
    }

    struct Forward(Arc<Log>);

    impl EventSink for Forward {
        fn handle_event(&self, event: OperationEvent) {
            self.0.0.lock().unwrap().push(format!("handle {}", event.kind));
        }
    }

    #[test]
    fn test_records_then_forwards() {
        let log = Arc::new(Log::default());
        let sink = RecordingEventSink::new(log.clone(), Arc::new(Forward(log.clone())));

        sink.handle_event(OperationEvent::new(
            OperationEventKind::Progress,
            CorrelationId::new("c"),
            OperationKind::PutFile,
            "col",
            "",
        ));

        assert_eq!(
            *log.0.lock().unwrap(),
            vec!["record Progress".to_string(), "handle Progress".to_string()]
        );
    }
}
