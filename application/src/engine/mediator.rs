//! Conversation mediator: routes inbound messages to live conversations.
//!
//! The mediator is the single point where the transport attaches. It
//! subscribes to the client's receiver destination when constructed, keeps a
//! `correlation id → conversation` registry, and runs a periodic sweep that
//! evicts finished conversations and fails those that outlived their
//! whole-operation timeout.
//!
//! ```text
//!  MessageBus ──on_message──▶ ConversationMediator ──lookup──▶ Conversation
//!                                   │
//!                              sweep task (interval, CancellationToken)
//! ```

use super::conversation::Conversation;
use super::context::OperationContext;
use crate::ports::message_bus::{MessageBus, MessageListener};
use bitrelay_domain::{ComponentSelector, CorrelationId, Message};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediatorError {
    #[error("A conversation with correlation id '{0}' is already registered")]
    DuplicateCorrelationId(CorrelationId),

    #[error("The mediator has been shut down")]
    ShutDown,
}

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Finished conversations removed from the registry.
    pub evicted: Vec<CorrelationId>,
    /// Conversations failed and removed for exceeding their timeout.
    pub timed_out: Vec<CorrelationId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty() && self.timed_out.is_empty()
    }
}

type Registry = Arc<RwLock<HashMap<CorrelationId, Arc<Conversation>>>>;

/// Registry of live conversations for one client.
pub struct ConversationMediator {
    conversations: Registry,
    bus: Arc<dyn MessageBus>,
    receiver_destination: String,
    /// What the bus holds; it only keeps a weak reference to the mediator.
    listener: Arc<dyn MessageListener>,
    runtime: Handle,
    cancel: CancellationToken,
    shut_down: AtomicBool,
}

impl ConversationMediator {
    /// Creates the mediator, subscribes it to `receiver_destination` and
    /// starts the sweep task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(
        bus: Arc<dyn MessageBus>,
        receiver_destination: impl Into<String>,
        cleanup_interval: Duration,
    ) -> Arc<Self> {
        let runtime = Handle::current();
        let mediator = Arc::new_cyclic(|weak: &Weak<Self>| Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
            bus,
            receiver_destination: receiver_destination.into(),
            listener: Arc::new(MediatorListener {
                mediator: weak.clone(),
            }),
            runtime,
            cancel: CancellationToken::new(),
            shut_down: AtomicBool::new(false),
        });

        mediator
            .bus
            .add_listener(&mediator.receiver_destination, mediator.listener.clone());
        mediator.spawn_sweeper(cleanup_interval);

        info!(
            "Conversation mediator listening on '{}'",
            mediator.receiver_destination
        );
        mediator
    }

    fn spawn_sweeper(self: &Arc<Self>, interval: Duration) {
        let weak = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(mediator) = weak.upgrade() else { break };
                        let report = mediator.sweep();
                        if !report.is_empty() {
                            debug!(
                                "Sweep evicted {} finished and {} timed out conversation(s)",
                                report.evicted.len(),
                                report.timed_out.len()
                            );
                        }
                    }
                }
            }
            trace!("Mediator sweep task stopped");
        });
    }

    /// Handle of the runtime conversations run their timers on.
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn receiver_destination(&self) -> &str {
        &self.receiver_destination
    }

    /// Registers a conversation under its correlation id.
    pub fn register(&self, conversation: Arc<Conversation>) -> Result<(), MediatorError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(MediatorError::ShutDown);
        }
        let id = conversation.correlation_id().clone();
        let mut conversations = self.conversations.write().unwrap_or_else(|e| e.into_inner());
        if conversations.contains_key(&id) {
            return Err(MediatorError::DuplicateCorrelationId(id));
        }
        debug!("[{}] Registered conversation", id.short());
        conversations.insert(id, conversation);
        Ok(())
    }

    /// Creates, registers and starts a conversation.
    ///
    /// Registration happens before the first broadcast so that no reply can
    /// arrive for an unknown correlation id.
    pub fn start_conversation(
        &self,
        context: OperationContext,
        selector: Box<dyn ComponentSelector>,
    ) -> Result<Arc<Conversation>, MediatorError> {
        let conversation = Conversation::new(context, selector, self.runtime.clone());
        self.register(Arc::clone(&conversation))?;
        conversation.start();
        Ok(conversation)
    }

    pub fn get(&self, correlation_id: &CorrelationId) -> Option<Arc<Conversation>> {
        self.conversations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(correlation_id)
            .cloned()
    }

    pub fn contains(&self, correlation_id: &CorrelationId) -> bool {
        self.get(correlation_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.conversations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes `conversation` if it is still the one registered under its id.
    fn remove(&self, conversation: &Arc<Conversation>) -> bool {
        let mut conversations = self.conversations.write().unwrap_or_else(|e| e.into_inner());
        match conversations.get(conversation.correlation_id()) {
            Some(current) if Arc::ptr_eq(current, conversation) => {
                conversations.remove(conversation.correlation_id());
                true
            }
            _ => false,
        }
    }

    /// Fails a conversation on a blocking worker, away from the caller.
    fn fail_detached(&self, conversation: Arc<Conversation>, reason: String) {
        self.runtime.spawn_blocking(move || {
            conversation.fail(&reason);
        });
    }

    /// Evicts finished conversations and fails expired ones.
    ///
    /// Works on a snapshot; conversations registered meanwhile are visited by
    /// the next sweep.
    pub fn sweep(&self) -> SweepReport {
        let snapshot: Vec<Arc<Conversation>> = self
            .conversations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();

        let mut report = SweepReport::default();
        for conversation in snapshot {
            if conversation.has_ended() {
                if self.remove(&conversation) {
                    trace!("[{}] Evicted finished conversation", conversation.correlation_id().short());
                    report.evicted.push(conversation.correlation_id().clone());
                }
            } else if conversation.is_expired() && self.remove(&conversation) {
                let timeout = conversation.context().config.conversation_timeout;
                warn!(
                    "[{}] Conversation exceeded its timeout of {:?}, failing it",
                    conversation.correlation_id().short(),
                    timeout
                );
                report.timed_out.push(conversation.correlation_id().clone());
                let reason = format!(
                    "Conversation timed out after {:?} in the {} phase",
                    timeout,
                    conversation.phase()
                );
                self.fail_detached(conversation, reason);
            }
        }
        report
    }

    /// Evicts a live conversation and fails it with `reason`.
    ///
    /// Returns `false` when no conversation with that id is registered.
    pub fn cancel(&self, correlation_id: &CorrelationId, reason: impl Into<String>) -> bool {
        let Some(conversation) = self.get(correlation_id) else {
            debug!("[{}] Cancel for unknown conversation", correlation_id.short());
            return false;
        };
        if !self.remove(&conversation) {
            return false;
        }
        info!("[{}] Cancelling conversation", correlation_id.short());
        self.fail_detached(conversation, reason.into());
        true
    }

    /// Stops the sweep, detaches from the bus and fails every live
    /// conversation.
    pub fn shutdown(self: &Arc<Self>) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        self.bus
            .remove_listener(&self.receiver_destination, &self.listener);

        let conversations: Vec<Arc<Conversation>> = self
            .conversations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, c)| c)
            .collect();
        for conversation in conversations {
            if !conversation.has_ended() {
                self.fail_detached(conversation, "Client shut down".to_string());
            }
        }
        info!("Conversation mediator on '{}' shut down", self.receiver_destination);
    }
}

impl MessageListener for ConversationMediator {
    fn on_message(&self, message: Message) {
        match self.get(&message.correlation_id) {
            Some(conversation) => conversation.on_message(message),
            None => debug!(
                "[{}] Dropping {} from '{}', no conversation with this correlation id",
                message.correlation_id.short(),
                message.body.type_name(),
                message.from
            ),
        }
    }
}

/// Subscription handed to the bus. Forwards to the mediator while it is
/// alive, so dropping the last client handle tears the mediator down.
struct MediatorListener {
    mediator: Weak<ConversationMediator>,
}

impl MessageListener for MediatorListener {
    fn on_message(&self, message: Message) {
        match self.mediator.upgrade() {
            Some(mediator) => mediator.on_message(message),
            None => trace!(
                "[{}] Dropping {}, the mediator is gone",
                message.correlation_id.short(),
                message.body.type_name()
            ),
        }
    }
}

impl Drop for ConversationMediator {
    fn drop(&mut self) {
        self.cancel.cancel();
        if !self.shut_down.load(Ordering::SeqCst) {
            self.bus
                .remove_listener(&self.receiver_destination, &self.listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientSettings, ConversationConfig};
    use crate::engine::state::ConversationPhase;
    use crate::ports::message_bus::{MessageSender, same_listener};
    use crate::use_cases::wait::BlockingEventSink;
    use bitrelay_domain::{
        AllContributorsSelector, ContributorId, MessageBody, OperationEventKind, OperationKind,
        OperationRequest, ResponseInfo,
    };
    use std::sync::Mutex;

    /// Bus double: records sent messages and listeners, delivers nothing.
    #[derive(Default)]
    struct StubBus {
        sent: Mutex<Vec<Message>>,
        listeners: Mutex<Vec<(String, Arc<dyn MessageListener>)>>,
    }

    impl MessageSender for StubBus {
        fn send(&self, message: Message) {
            self.sent.lock().unwrap().push(message);
        }
    }

    impl MessageBus for StubBus {
        fn add_listener(&self, destination: &str, listener: Arc<dyn MessageListener>) {
            self.listeners
                .lock()
                .unwrap()
                .push((destination.to_string(), listener));
        }

        fn remove_listener(&self, destination: &str, listener: &Arc<dyn MessageListener>) {
            self.listeners
                .lock()
                .unwrap()
                .retain(|(d, l)| !(d == destination && same_listener(l, listener)));
        }
    }

    fn id(name: &str) -> ContributorId {
        ContributorId::new(name)
    }

    fn mediator(bus: &Arc<StubBus>) -> Arc<ConversationMediator> {
        ConversationMediator::new(bus.clone(), "client-receiver", Duration::from_secs(1))
    }

    fn start(
        mediator: &ConversationMediator,
        bus: &Arc<StubBus>,
        correlation_id: &str,
        config: ConversationConfig,
    ) -> (Arc<Conversation>, Arc<BlockingEventSink>) {
        let sink = Arc::new(BlockingEventSink::new());
        let settings = ClientSettings::new("client", "col", vec![id("p1"), id("p2")]);
        let context = OperationContext::new(
            &settings,
            OperationRequest::GetFileIds,
            None,
            config,
            bus.clone(),
            sink.clone(),
        )
        .with_correlation_id(CorrelationId::new(correlation_id));
        let selector = Box::new(AllContributorsSelector::new(vec![id("p1"), id("p2")]));
        let conversation = mediator.start_conversation(context, selector).unwrap();
        (conversation, sink)
    }

    fn identify(correlation_id: &str, name: &str) -> Message {
        Message {
            correlation_id: CorrelationId::new(correlation_id),
            from: name.to_string(),
            to: "client-receiver".to_string(),
            reply_to: format!("{}-queue", name),
            collection_id: "col".to_string(),
            body: MessageBody::IdentifyResponse {
                operation: OperationKind::GetFileIds,
                contributor_id: id(name),
                response_info: Some(ResponseInfo::positive_identification()),
                time_to_deliver_ms: None,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribes_on_construction() {
        let bus = Arc::new(StubBus::default());
        let _mediator = mediator(&bus);
        let listeners = bus.listeners.lock().unwrap();
        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0].0, "client-receiver");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_mediator_unsubscribes() {
        let bus = Arc::new(StubBus::default());
        let mediator = mediator(&bus);
        let weak = Arc::downgrade(&mediator);
        let listener = bus.listeners.lock().unwrap()[0].1.clone();

        drop(mediator);
        assert!(weak.upgrade().is_none());
        assert!(bus.listeners.lock().unwrap().is_empty());

        // A late delivery through a stale subscription is dropped quietly.
        listener.on_message(identify("conv-a", "p1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_routes_by_correlation_id() {
        let bus = Arc::new(StubBus::default());
        let mediator = mediator(&bus);
        let (a, _) = start(&mediator, &bus, "conv-a", ConversationConfig::default());
        let (b, _) = start(&mediator, &bus, "conv-b", ConversationConfig::default());

        mediator.on_message(identify("conv-a", "p1"));
        mediator.on_message(identify("conv-a", "p2"));

        assert_eq!(a.phase(), ConversationPhase::Executing);
        assert_eq!(b.phase(), ConversationPhase::Identifying);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_correlation_id_is_dropped() {
        let bus = Arc::new(StubBus::default());
        let mediator = mediator(&bus);

        mediator.on_message(identify("nobody", "p1"));

        assert!(mediator.is_empty());
        assert!(bus.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_registration_is_rejected() {
        let bus = Arc::new(StubBus::default());
        let mediator = mediator(&bus);
        start(&mediator, &bus, "conv-a", ConversationConfig::default());

        let settings = ClientSettings::new("client", "col", vec![id("p1")]);
        let context = OperationContext::new(
            &settings,
            OperationRequest::GetFileIds,
            None,
            ConversationConfig::default(),
            bus.clone(),
            Arc::new(BlockingEventSink::new()),
        )
        .with_correlation_id(CorrelationId::new("conv-a"));
        let result = mediator.start_conversation(
            context,
            Box::new(AllContributorsSelector::new(vec![id("p1")])),
        );
        assert_eq!(
            result.unwrap_err(),
            MediatorError::DuplicateCorrelationId(CorrelationId::new("conv-a"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_fails_expired_conversation() {
        let bus = Arc::new(StubBus::default());
        let mediator = mediator(&bus);
        let config = ConversationConfig::default()
            .with_identification_timeout(Duration::from_secs(600))
            .with_conversation_timeout(Duration::from_secs(30));
        let (conversation, sink) = start(&mediator, &bus, "conv-a", config);

        let terminal = sink.wait_for_finish(Duration::from_secs(60)).await.unwrap();
        assert_eq!(terminal.kind, OperationEventKind::Failed);
        assert!(terminal.info.contains("timed out"));
        assert!(conversation.has_ended());
        assert!(!mediator.contains(&CorrelationId::new("conv-a")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_finished_conversation() {
        let bus = Arc::new(StubBus::default());
        let mediator = mediator(&bus);
        let (conversation, _sink) = start(&mediator, &bus, "conv-a", ConversationConfig::default());
        conversation.fail("done");

        let report = mediator.sweep();
        assert_eq!(report.evicted, vec![CorrelationId::new("conv-a")]);
        assert!(report.timed_out.is_empty());
        assert!(mediator.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_fails_and_evicts() {
        let bus = Arc::new(StubBus::default());
        let mediator = mediator(&bus);
        let (_conversation, sink) = start(&mediator, &bus, "conv-a", ConversationConfig::default());

        assert!(mediator.cancel(&CorrelationId::new("conv-a"), "user abort"));
        assert!(!mediator.cancel(&CorrelationId::new("conv-a"), "again"));

        let terminal = sink.wait_for_finish(Duration::from_secs(5)).await.unwrap();
        assert_eq!(terminal.kind, OperationEventKind::Failed);
        assert_eq!(terminal.info, "user abort");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_detaches_and_rejects_registration() {
        let bus = Arc::new(StubBus::default());
        let mediator = mediator(&bus);
        let (_conversation, sink) = start(&mediator, &bus, "conv-a", ConversationConfig::default());

        mediator.shutdown();
        assert!(bus.listeners.lock().unwrap().is_empty());

        let terminal = sink.wait_for_finish(Duration::from_secs(5)).await.unwrap();
        assert_eq!(terminal.kind, OperationEventKind::Failed);
        assert!(mediator.is_empty());
        let settings = ClientSettings::new("client", "col", vec![id("p1")]);
        let context = OperationContext::new(
            &settings,
            OperationRequest::GetFileIds,
            None,
            ConversationConfig::default(),
            bus.clone(),
            Arc::new(BlockingEventSink::new()),
        );
        let conversation = Conversation::new(
            context,
            Box::new(AllContributorsSelector::new(vec![id("p1")])),
            Handle::current(),
        );
        assert_eq!(mediator.register(conversation), Err(MediatorError::ShutDown));
    }
}
