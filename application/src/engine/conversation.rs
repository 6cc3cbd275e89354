//! A live conversation: one operation driven through its phases.
//!
//! All handling for one conversation is serialized by a mutex around its
//! state. The lock is never held across an await point; sending messages is
//! fire-and-forget and events are handed to a per-conversation dispatch task,
//! so neither can stall the delivery path.
//!
//! # Timers
//!
//! Each phase arms one timer task. Every transition bumps a phase counter
//! and aborts the previous timer; a timer that still fires compares its
//! counter against the current one and does nothing on mismatch.

use super::context::OperationContext;
use super::monitor::{EventMonitor, Outcome};
use super::state::{ConversationPhase, ConversationState};
use crate::ports::event_sink::EventSink;
use bitrelay_domain::{ComponentSelector, CorrelationId, Message, OperationEvent};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

struct Inner {
    state: ConversationState,
    monitor: EventMonitor,
    events: Option<mpsc::UnboundedSender<OperationEvent>>,
    started: bool,
    phase_seq: u64,
    timer: Option<JoinHandle<()>>,
}

impl Inner {
    /// Hands the pending events to the dispatch task, in emission order.
    fn flush(&mut self) {
        let events = self.monitor.take_events();
        if let Some(tx) = &self.events {
            for event in events {
                if tx.send(event).is_err() {
                    debug!("Event dispatcher stopped, dropping event");
                }
            }
        }
        if self.state.is_finished() {
            // Closing the channel ends the dispatch task once it drains.
            self.events = None;
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// The live instance of one operation.
pub struct Conversation {
    context: Arc<OperationContext>,
    start_time: Instant,
    created_at: DateTime<Utc>,
    runtime: Handle,
    this: Weak<Conversation>,
    inner: Mutex<Inner>,
}

impl Conversation {
    /// Creates a conversation in the identifying phase.
    ///
    /// Timers and event dispatch run on `runtime`. Nothing is sent until
    /// [`start`](Self::start).
    pub fn new(
        context: OperationContext,
        selector: Box<dyn ComponentSelector>,
        runtime: Handle,
    ) -> Arc<Self> {
        let monitor = EventMonitor::new(&context);
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(dispatch_events(
            rx,
            Arc::clone(&context.event_sink),
            context.correlation_id.clone(),
        ));

        Arc::new_cyclic(|this| Self {
            context: Arc::new(context),
            start_time: Instant::now(),
            created_at: Utc::now(),
            runtime,
            this: this.clone(),
            inner: Mutex::new(Inner {
                state: ConversationState::identifying(selector),
                monitor,
                events: Some(tx),
                started: false,
                phase_seq: 0,
                timer: None,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.context.correlation_id
    }

    pub fn context(&self) -> &OperationContext {
        &self.context
    }

    /// Wall clock creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn age(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Whether the conversation outlived its whole-operation timeout.
    pub fn is_expired(&self) -> bool {
        self.age() > self.context.config.conversation_timeout
    }

    pub fn phase(&self) -> ConversationPhase {
        self.lock().state.phase()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.lock().state.outcome()
    }

    pub fn has_ended(&self) -> bool {
        self.lock().state.is_finished()
    }

    /// Broadcasts the identify request and arms the identification timer.
    ///
    /// Calling it again has no effect.
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.started || inner.state.is_finished() {
            debug!("[{}] Conversation already started", self.context.short_id());
            return;
        }
        inner.started = true;
        debug!(
            "[{}] Starting {} conversation",
            self.context.short_id(),
            self.context.operation
        );

        let Inner { state, monitor, .. } = &mut *inner;
        state.enter(&self.context, monitor);
        self.arm_timer(&mut inner);
        inner.flush();
    }

    /// Delegates one inbound message to the current phase.
    pub fn on_message(&self, message: Message) {
        let mut inner = self.lock();
        let Inner { state, monitor, .. } = &mut *inner;
        let next = state.on_message(&message, &self.context, monitor);
        if let Some(next) = next {
            self.transition(&mut inner, next);
        }
        inner.flush();
    }

    /// Ends the conversation with a `Failed` event.
    ///
    /// Returns `false` when the conversation had already finished.
    pub fn fail(&self, reason: &str) -> bool {
        let mut inner = self.lock();
        if inner.state.is_finished() {
            return false;
        }
        inner.monitor.failed(reason.to_string());
        self.transition(&mut inner, ConversationState::finished(Outcome::Failed));
        inner.flush();
        true
    }

    fn transition(&self, inner: &mut Inner, next: ConversationState) {
        debug!(
            "[{}] {} -> {}",
            self.context.short_id(),
            inner.state.phase(),
            next.phase()
        );
        inner.cancel_timer();
        inner.phase_seq += 1;
        inner.state = next;

        let Inner { state, monitor, .. } = &mut *inner;
        state.enter(&self.context, monitor);
        self.arm_timer(inner);
    }

    fn arm_timer(&self, inner: &mut Inner) {
        let Some(timeout) = inner.state.timeout(&self.context) else {
            return;
        };
        let seq = inner.phase_seq;
        let this = self.this.clone();
        inner.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(conversation) = this.upgrade() {
                conversation.on_phase_timeout(seq);
            }
        }));
    }

    fn on_phase_timeout(&self, seq: u64) {
        let mut inner = self.lock();
        if inner.phase_seq != seq {
            return;
        }
        inner.timer = None;
        let Inner { state, monitor, .. } = &mut *inner;
        if let Some(next) = state.on_timeout(&self.context, monitor) {
            self.transition(&mut inner, next);
        }
        inner.flush();
    }
}

impl Drop for Conversation {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(|e| e.into_inner());
        inner.cancel_timer();
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("correlation_id", &self.context.correlation_id)
            .field("operation", &self.context.operation)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Delivers events to the sink one at a time, off the async workers.
async fn dispatch_events(
    mut rx: mpsc::UnboundedReceiver<OperationEvent>,
    sink: Arc<dyn EventSink>,
    correlation_id: CorrelationId,
) {
    while let Some(event) = rx.recv().await {
        let sink = Arc::clone(&sink);
        if let Err(e) = tokio::task::spawn_blocking(move || sink.handle_event(event)).await {
            warn!("[{}] Event sink failed: {}", correlation_id.short(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientSettings, ConversationConfig};
    use crate::ports::message_bus::MessageSender;
    use crate::use_cases::wait::BlockingEventSink;
    use bitrelay_domain::{
        AllContributorsSelector, ContributorId, MessageBody, OperationEventKind, OperationKind,
        OperationRequest, OperationResult, ResponseCode, ResponseInfo,
        SpecificContributorSelector,
    };

    #[derive(Default)]
    struct RecordingSender(std::sync::Mutex<Vec<Message>>);

    impl RecordingSender {
        fn sent(&self) -> Vec<Message> {
            self.0.lock().unwrap().clone()
        }

        fn requests_to(&self, name: &str) -> usize {
            self.sent()
                .iter()
                .filter(|m| {
                    matches!(&m.body, MessageBody::OperationRequest { contributor_id, .. }
                        if contributor_id.as_str() == name)
                })
                .count()
        }
    }

    impl MessageSender for RecordingSender {
        fn send(&self, message: Message) {
            self.0.lock().unwrap().push(message);
        }
    }

    fn id(name: &str) -> ContributorId {
        ContributorId::new(name)
    }

    fn ids(names: &[&str]) -> Vec<ContributorId> {
        names.iter().map(|n| id(n)).collect()
    }

    struct Fixture {
        sender: Arc<RecordingSender>,
        sink: Arc<BlockingEventSink>,
        conversation: Arc<Conversation>,
    }

    fn fixture(selector: Box<dyn ComponentSelector>, config: ConversationConfig) -> Fixture {
        let sender = Arc::new(RecordingSender::default());
        let sink = Arc::new(BlockingEventSink::new());
        let settings = ClientSettings::new("client", "col", ids(&["p1", "p2", "p3"]));
        let context = OperationContext::new(
            &settings,
            OperationRequest::GetFileIds,
            None,
            config,
            sender.clone(),
            sink.clone(),
        )
        .with_correlation_id(CorrelationId::new("conv-1"));
        let conversation = Conversation::new(context, selector, Handle::current());
        Fixture {
            sender,
            sink,
            conversation,
        }
    }

    fn reply(name: &str, body: MessageBody) -> Message {
        Message {
            correlation_id: CorrelationId::new("conv-1"),
            from: name.to_string(),
            to: "client-receiver".to_string(),
            reply_to: format!("{}-queue", name),
            collection_id: "col".to_string(),
            body,
        }
    }

    fn identify(name: &str, code: ResponseCode) -> Message {
        reply(
            name,
            MessageBody::IdentifyResponse {
                operation: OperationKind::GetFileIds,
                contributor_id: id(name),
                response_info: Some(ResponseInfo::new(code)),
                time_to_deliver_ms: None,
            },
        )
    }

    fn final_reply(name: &str, code: ResponseCode) -> Message {
        reply(
            name,
            MessageBody::FinalResponse {
                operation: OperationKind::GetFileIds,
                contributor_id: id(name),
                response_info: Some(ResponseInfo::new(code)),
                result: Some(OperationResult::GetFileIds {
                    file_ids: vec![format!("{}-file", name)],
                }),
            },
        )
    }

    fn all_selector() -> Box<dyn ComponentSelector> {
        Box::new(AllContributorsSelector::new(ids(&["p1", "p2", "p3"])))
    }

    fn kinds(events: &[OperationEvent]) -> Vec<OperationEventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_completes() {
        let f = fixture(all_selector(), ConversationConfig::default());
        f.conversation.start();
        assert_eq!(f.sender.sent().len(), 1);
        assert_eq!(f.sender.sent()[0].to, "col-topic");

        for name in ["p1", "p2", "p3"] {
            f.conversation
                .on_message(identify(name, ResponseCode::IdentificationPositive));
        }
        assert_eq!(f.conversation.phase(), ConversationPhase::Executing);
        assert_eq!(f.sender.requests_to("p2"), 1);
        assert_eq!(f.sender.sent()[2].to, "p2-queue");

        for name in ["p1", "p2", "p3"] {
            f.conversation
                .on_message(final_reply(name, ResponseCode::OperationCompleted));
        }
        assert!(f.conversation.has_ended());

        let terminal = f.sink.wait_for_finish(Duration::from_secs(5)).await.unwrap();
        assert_eq!(terminal.kind, OperationEventKind::Complete);
        assert_eq!(terminal.contributor_results.len(), 3);
        assert_eq!(f.conversation.outcome(), Some(Outcome::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identification_timeout_proceeds_with_responders() {
        let f = fixture(all_selector(), ConversationConfig::default());
        f.conversation.start();
        f.conversation
            .on_message(identify("p1", ResponseCode::IdentificationPositive));
        f.conversation
            .on_message(identify("p2", ResponseCode::IdentificationPositive));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(f.conversation.phase(), ConversationPhase::Executing);
        assert_eq!(f.sender.requests_to("p1"), 1);
        assert_eq!(f.sender.requests_to("p2"), 1);
        assert_eq!(f.sender.requests_to("p3"), 0);

        f.conversation
            .on_message(final_reply("p1", ResponseCode::OperationCompleted));
        f.conversation
            .on_message(final_reply("p2", ResponseCode::OperationCompleted));

        let terminal = f.sink.wait_for_finish(Duration::from_secs(5)).await.unwrap();
        assert_eq!(terminal.kind, OperationEventKind::Complete);

        let events = f.sink.events();
        let selected = events
            .iter()
            .find(|e| e.kind == OperationEventKind::ContributorsSelected)
            .unwrap();
        assert_eq!(selected.selected, ids(&["p1", "p2"]));
        let tail: Vec<_> = kinds(&events).into_iter().rev().take(3).collect();
        assert_eq!(
            tail,
            vec![
                OperationEventKind::Complete,
                OperationEventKind::ContributorComplete,
                OperationEventKind::ContributorComplete,
            ]
        );
        assert!(kinds(&events).contains(&OperationEventKind::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_positive_reply_before_timeout() {
        let f = fixture(all_selector(), ConversationConfig::default());
        f.conversation.start();
        f.conversation
            .on_message(identify("p1", ResponseCode::IdentificationNegative));

        let terminal = f.sink.wait_for_finish(Duration::from_secs(60)).await.unwrap();
        assert_eq!(terminal.kind, OperationEventKind::NoContributorFound);
        assert_eq!(f.sender.sent().len(), 1);
        assert_eq!(f.conversation.outcome(), Some(Outcome::NoContributorFound));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_codes_end_identification_without_timer() {
        let f = fixture(all_selector(), ConversationConfig::default());
        f.conversation.start();
        for name in ["p1", "p2", "p3"] {
            f.conversation
                .on_message(identify(name, ResponseCode::FileNotFound));
        }
        assert!(f.conversation.has_ended());
        assert_eq!(f.conversation.outcome(), Some(Outcome::NoContributorFound));

        let terminal = f.sink.wait_for_finish(Duration::from_secs(1)).await.unwrap();
        assert_eq!(terminal.kind, OperationEventKind::NoContributorFound);
        let events = f.sink.events();
        let failed: Vec<_> = events
            .iter()
            .filter(|e| e.kind == OperationEventKind::ContributorFailed)
            .collect();
        assert_eq!(failed.len(), 3);
        assert!(
            failed
                .iter()
                .all(|e| e.response_code == Some(ResponseCode::FileNotFound))
        );
        assert!(!kinds(&events).contains(&OperationEventKind::TimedOut));
        assert_eq!(f.sender.sent().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_delivery_is_handled_one_at_a_time() {
        let f = fixture(all_selector(), ConversationConfig::default());
        f.conversation.start();

        let conversation = f.conversation.clone();
        tokio::task::spawn_blocking(move || {
            std::thread::scope(|scope| {
                for _ in 0..8 {
                    let conversation = &conversation;
                    scope.spawn(move || {
                        for name in ["p1", "p2", "p3"] {
                            conversation
                                .on_message(identify(name, ResponseCode::IdentificationPositive));
                        }
                        for name in ["p1", "p2", "p3"] {
                            conversation
                                .on_message(final_reply(name, ResponseCode::OperationCompleted));
                        }
                    });
                }
            });
        })
        .await
        .unwrap();

        assert!(f.conversation.has_ended());
        let terminal = f.sink.wait_for_finish(Duration::from_secs(10)).await.unwrap();
        assert_eq!(terminal.kind, OperationEventKind::Complete);

        let events = f.sink.events();
        let completed: Vec<_> = events
            .iter()
            .filter(|e| e.kind == OperationEventKind::ContributorComplete)
            .filter_map(|e| e.contributor.clone())
            .collect();
        assert_eq!(completed.len(), 3);
        for name in ["p1", "p2", "p3"] {
            assert!(completed.contains(&id(name)));
            assert_eq!(f.sender.requests_to(name), 1);
        }
        let terminal_count = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminal_count, 1);
        assert_eq!(terminal.contributor_results.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_timeout_names_outstanding() {
        let f = fixture(all_selector(), ConversationConfig::default());
        f.conversation.start();
        for name in ["p1", "p2", "p3"] {
            f.conversation
                .on_message(identify(name, ResponseCode::IdentificationPositive));
        }
        f.conversation
            .on_message(final_reply("p1", ResponseCode::OperationCompleted));

        let terminal = f.sink.wait_for_finish(Duration::from_secs(600)).await.unwrap();
        assert_eq!(terminal.kind, OperationEventKind::Failed);
        assert!(terminal.info.contains("p2, p3"));
        let failed: Vec<_> = f
            .sink
            .events()
            .into_iter()
            .filter(|e| e.kind == OperationEventKind::ContributorFailed)
            .filter_map(|e| e.contributor)
            .collect();
        assert_eq!(failed, ids(&["p2", "p3"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_final_reply_fails_operation() {
        let f = fixture(all_selector(), ConversationConfig::default());
        f.conversation.start();
        for name in ["p1", "p2", "p3"] {
            f.conversation
                .on_message(identify(name, ResponseCode::IdentificationPositive));
        }
        f.conversation
            .on_message(final_reply("p1", ResponseCode::OperationCompleted));
        f.conversation
            .on_message(final_reply("p2", ResponseCode::FileNotFound));
        f.conversation
            .on_message(final_reply("p3", ResponseCode::OperationCompleted));

        let terminal = f.sink.wait_for_finish(Duration::from_secs(5)).await.unwrap();
        assert_eq!(terminal.kind, OperationEventKind::Failed);
        assert!(terminal.info.contains("p2 (FILE_NOT_FOUND"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_final_after_finish_is_ignored() {
        let f = fixture(all_selector(), ConversationConfig::default());
        f.conversation.start();
        for name in ["p1", "p2", "p3"] {
            f.conversation
                .on_message(identify(name, ResponseCode::IdentificationPositive));
        }
        for name in ["p1", "p2", "p3"] {
            f.conversation
                .on_message(final_reply(name, ResponseCode::OperationCompleted));
        }
        f.sink.wait_for_finish(Duration::from_secs(5)).await.unwrap();
        let before = f.sink.events().len();

        f.conversation
            .on_message(final_reply("p1", ResponseCode::OperationCompleted));
        f.conversation
            .on_message(final_reply("p1", ResponseCode::OperationCompleted));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(f.sink.events().len(), before);
        assert!(!f.conversation.fail("late"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_identify_reply_produces_warning_only() {
        let f = fixture(all_selector(), ConversationConfig::default());
        f.conversation.start();
        f.conversation
            .on_message(identify("p1", ResponseCode::IdentificationPositive));
        f.conversation
            .on_message(identify("p1", ResponseCode::IdentificationPositive));
        f.conversation
            .on_message(identify("p9", ResponseCode::IdentificationPositive));
        assert_eq!(f.conversation.phase(), ConversationPhase::Identifying);

        f.conversation.fail("stop");
        f.sink.wait_for_finish(Duration::from_secs(5)).await.unwrap();
        let warnings = f
            .sink
            .events()
            .into_iter()
            .filter(|e| e.kind == OperationEventKind::Warning)
            .count();
        assert_eq!(warnings, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_specific_selection_targets_only_named_contributor() {
        let selector = Box::new(SpecificContributorSelector::new(
            id("p2"),
            ids(&["p1", "p2", "p3"]),
        ));
        let f = fixture(selector, ConversationConfig::default());
        f.conversation.start();
        for name in ["p1", "p3", "p2"] {
            f.conversation
                .on_message(identify(name, ResponseCode::IdentificationPositive));
        }

        assert_eq!(f.conversation.phase(), ConversationPhase::Executing);
        assert_eq!(f.sender.requests_to("p2"), 1);
        assert_eq!(f.sender.requests_to("p1"), 0);
        assert_eq!(f.sender.requests_to("p3"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_does_not_fire_after_transition() {
        let config = ConversationConfig::default()
            .with_identification_timeout(Duration::from_secs(5))
            .with_operation_timeout(Duration::from_secs(60));
        let f = fixture(all_selector(), config);
        f.conversation.start();
        for name in ["p1", "p2", "p3"] {
            f.conversation
                .on_message(identify(name, ResponseCode::IdentificationPositive));
        }

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(f.conversation.phase(), ConversationPhase::Executing);
        assert!(
            !kinds(&f.sink.events()).contains(&OperationEventKind::TimedOut),
            "identification timer must not fire after the phase ended"
        );
    }
}
