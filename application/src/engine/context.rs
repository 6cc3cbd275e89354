//! Immutable parameters of one operation.

use crate::config::{ClientSettings, ConversationConfig};
use crate::ports::event_sink::EventSink;
use crate::ports::message_bus::MessageSender;
use bitrelay_domain::{ContributorId, CorrelationId, OperationKind, OperationRequest};
use std::sync::Arc;

/// Everything a conversation needs to know about its operation.
///
/// Built once by the caller and shared by the conversation and its phases.
pub struct OperationContext {
    pub correlation_id: CorrelationId,
    pub operation: OperationKind,
    pub collection_id: String,
    /// Sender id stamped on outgoing messages.
    pub client_id: String,
    /// Destination replies are sent to.
    pub reply_to: String,
    /// Destination the identify request is broadcast to.
    pub collection_destination: String,
    pub file_id: Option<String>,
    /// Contributors the identify request is addressed to.
    pub contributors: Vec<ContributorId>,
    /// Payload of the execution-phase request.
    pub request: OperationRequest,
    pub config: ConversationConfig,
    pub sender: Arc<dyn MessageSender>,
    pub event_sink: Arc<dyn EventSink>,
}

impl OperationContext {
    /// Creates a context with a fresh correlation id.
    pub fn new(
        settings: &ClientSettings,
        request: OperationRequest,
        file_id: Option<String>,
        config: ConversationConfig,
        sender: Arc<dyn MessageSender>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            correlation_id: CorrelationId::generate(),
            operation: request.kind(),
            collection_id: settings.collection_id.clone(),
            client_id: settings.client_id.clone(),
            reply_to: settings.receiver_destination.clone(),
            collection_destination: settings.collection_destination.clone(),
            file_id,
            contributors: settings.contributors.clone(),
            request,
            config,
            sender,
            event_sink,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Restricts the identify request to a subset of the collection.
    pub fn with_contributors(mut self, contributors: Vec<ContributorId>) -> Self {
        self.contributors = contributors;
        self
    }

    /// Log prefix for this conversation.
    pub fn short_id(&self) -> &str {
        self.correlation_id.short()
    }
}

impl std::fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("correlation_id", &self.correlation_id)
            .field("operation", &self.operation)
            .field("collection_id", &self.collection_id)
            .field("file_id", &self.file_id)
            .field("contributors", &self.contributors)
            .finish_non_exhaustive()
    }
}
