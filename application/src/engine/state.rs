//! Phase state machine of a conversation.
//!
//! ```text
//!  Identifying ──selector finished / timeout with selection──▶ Executing
//!       │                                                        │
//!       └──no selection──▶ Finished ◀──all final replies / timeout┘
//! ```
//!
//! Every operation kind shares this shape. The kind only changes the request
//! payload sent on entering [`ExecutingState`], which comes from the
//! [`OperationContext`], and the operation replies must carry.

use super::context::OperationContext;
use super::monitor::{EventMonitor, Outcome};
use bitrelay_domain::{
    ComponentSelector, ContributorId, ConversationError, IdentifyReply, Message, MessageBody,
    OperationResult, PROTOCOL_MIN_VERSION, PROTOCOL_VERSION, ResponseCode, ResponseInfo,
    ResponseTracker, SelectedContributor, format_contributors,
};
use std::time::Duration;
use tracing::debug;

/// Phase a conversation is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationPhase {
    Identifying,
    Executing,
    Finished,
}

impl std::fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationPhase::Identifying => write!(f, "identifying"),
            ConversationPhase::Executing => write!(f, "executing"),
            ConversationPhase::Finished => write!(f, "finished"),
        }
    }
}

/// Current state of a conversation. Replaced wholesale on each transition.
#[derive(Debug)]
pub enum ConversationState {
    Identifying(IdentifyingState),
    Executing(ExecutingState),
    Finished(FinishedState),
}

impl ConversationState {
    pub fn identifying(selector: Box<dyn ComponentSelector>) -> Self {
        ConversationState::Identifying(IdentifyingState { selector })
    }

    pub fn finished(outcome: Outcome) -> Self {
        ConversationState::Finished(FinishedState { outcome })
    }

    pub fn phase(&self) -> ConversationPhase {
        match self {
            ConversationState::Identifying(_) => ConversationPhase::Identifying,
            ConversationState::Executing(_) => ConversationPhase::Executing,
            ConversationState::Finished(_) => ConversationPhase::Finished,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, ConversationState::Finished(_))
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            ConversationState::Finished(state) => Some(state.outcome),
            _ => None,
        }
    }

    /// Phase timeout, `None` for the terminal state.
    pub fn timeout(&self, context: &OperationContext) -> Option<Duration> {
        match self {
            ConversationState::Identifying(_) => Some(context.config.identification_timeout),
            ConversationState::Executing(_) => Some(context.config.operation_timeout),
            ConversationState::Finished(_) => None,
        }
    }

    /// Performs the entry side effect of the phase.
    pub fn enter(&self, context: &OperationContext, monitor: &mut EventMonitor) {
        match self {
            ConversationState::Identifying(state) => state.enter(context, monitor),
            ConversationState::Executing(state) => state.enter(context, monitor),
            ConversationState::Finished(_) => {}
        }
    }

    /// Consumes one inbound message. Returns the next state on transition.
    pub fn on_message(
        &mut self,
        message: &Message,
        context: &OperationContext,
        monitor: &mut EventMonitor,
    ) -> Option<ConversationState> {
        if let ConversationState::Finished(_) = self {
            debug!(
                "[{}] Ignoring {} from '{}', conversation has finished",
                context.short_id(),
                message.body.type_name(),
                message.from
            );
            return None;
        }
        if !accepts(message, context, monitor) {
            return None;
        }
        match self {
            ConversationState::Identifying(state) => state.on_message(message, context, monitor),
            ConversationState::Executing(state) => state.on_message(message, context, monitor),
            ConversationState::Finished(_) => None,
        }
    }

    /// Handles expiry of the phase timeout.
    pub fn on_timeout(
        &mut self,
        context: &OperationContext,
        monitor: &mut EventMonitor,
    ) -> Option<ConversationState> {
        match self {
            ConversationState::Identifying(state) => Some(state.on_timeout(context, monitor)),
            ConversationState::Executing(state) => Some(state.on_timeout(context, monitor)),
            ConversationState::Finished(_) => None,
        }
    }
}

/// Drops requests and replies belonging to another operation or collection.
fn accepts(message: &Message, context: &OperationContext, monitor: &mut EventMonitor) -> bool {
    if message.body.is_request() {
        debug!(
            "[{}] Ignoring {} from '{}', requests are not handled by the client",
            context.short_id(),
            message.body.type_name(),
            message.from
        );
        return false;
    }
    if message.body.operation() != context.operation {
        monitor.warning(
            message.body.contributor_id(),
            format!(
                "Received {} for operation {} in a {} conversation",
                message.body.type_name(),
                message.body.operation(),
                context.operation
            ),
        );
        return false;
    }
    if message.collection_id != context.collection_id {
        monitor.warning(
            message.body.contributor_id(),
            format!(
                "Received {} for collection '{}' in a conversation for '{}'",
                message.body.type_name(),
                message.collection_id,
                context.collection_id
            ),
        );
        return false;
    }
    true
}

/// Reply-level errors drop the reply and surface as a `Warning`.
fn report_reply_error(
    error: ConversationError,
    contributor: &ContributorId,
    monitor: &mut EventMonitor,
) {
    monitor.warning(Some(contributor), error.to_string());
}

fn describe(info: Option<&ResponseInfo>) -> String {
    info.map(|i| i.describe()).unwrap_or_default()
}

// ==================== Identifying ====================

/// Broadcasts the identify request and collects answers through a selector.
#[derive(Debug)]
pub struct IdentifyingState {
    selector: Box<dyn ComponentSelector>,
}

impl IdentifyingState {
    pub fn selector(&self) -> &dyn ComponentSelector {
        self.selector.as_ref()
    }

    fn enter(&self, context: &OperationContext, monitor: &mut EventMonitor) {
        context.sender.send(Message {
            correlation_id: context.correlation_id.clone(),
            from: context.client_id.clone(),
            to: context.collection_destination.clone(),
            reply_to: context.reply_to.clone(),
            collection_id: context.collection_id.clone(),
            body: MessageBody::IdentifyRequest {
                operation: context.operation,
                file_id: context.file_id.clone(),
                min_version: PROTOCOL_MIN_VERSION,
                version: PROTOCOL_VERSION,
            },
        });
        monitor.identify_request_sent(&context.contributors);
    }

    fn on_message(
        &mut self,
        message: &Message,
        context: &OperationContext,
        monitor: &mut EventMonitor,
    ) -> Option<ConversationState> {
        let Some(reply) = IdentifyReply::from_message(message) else {
            debug!(
                "[{}] Ignoring {} from '{}' during identification",
                context.short_id(),
                message.body.type_name(),
                message.from
            );
            return None;
        };

        if let Err(error) = self.selector.process_reply(&reply) {
            report_reply_error(error, &reply.contributor_id, monitor);
            return None;
        }

        let info = describe(reply.response_info.as_ref());
        match reply.response_info.as_ref().map(|i| i.response_code) {
            Some(ResponseCode::IdentificationPositive) => {
                monitor.contributor_identified(&reply.contributor_id, info);
            }
            Some(ResponseCode::IdentificationNegative) | None => {
                debug!(
                    "[{}] Contributor {} declined: {}",
                    context.short_id(),
                    reply.contributor_id,
                    info
                );
            }
            Some(code) => monitor.contributor_failed(&reply.contributor_id, Some(code), info),
        }

        match self.selector.is_finished() {
            Ok(true) => Some(self.proceed(monitor)),
            Ok(false) => None,
            Err(error) => {
                monitor.no_contributor_found(error.to_string());
                Some(ConversationState::finished(Outcome::NoContributorFound))
            }
        }
    }

    fn on_timeout(
        &mut self,
        context: &OperationContext,
        monitor: &mut EventMonitor,
    ) -> ConversationState {
        let outstanding = format_contributors(&self.selector.outstanding());
        monitor.timed_out(format!(
            "Identification timed out after {:?}, no response from: {}",
            context.config.identification_timeout, outstanding
        ));

        if self.selector.has_selection() {
            return self.proceed(monitor);
        }
        monitor.no_contributor_found(format!(
            "No contributor identified before the timeout among: {}",
            format_contributors(self.selector.candidates())
        ));
        ConversationState::finished(Outcome::NoContributorFound)
    }

    fn proceed(&self, monitor: &mut EventMonitor) -> ConversationState {
        monitor.contributors_selected(self.selector.selected_ids());
        ConversationState::Executing(ExecutingState::new(self.selector.selected().to_vec()))
    }
}

// ==================== Executing ====================

/// Sends the operation request to each selected contributor and waits for
/// their final replies.
#[derive(Debug)]
pub struct ExecutingState {
    selected: Vec<SelectedContributor>,
    tracker: ResponseTracker,
}

impl ExecutingState {
    pub fn new(selected: Vec<SelectedContributor>) -> Self {
        let tracker = ResponseTracker::new(selected.iter().map(|s| s.contributor_id.clone()));
        Self { selected, tracker }
    }

    pub fn selected(&self) -> &[SelectedContributor] {
        &self.selected
    }

    pub fn outstanding(&self) -> Vec<ContributorId> {
        self.tracker.outstanding()
    }

    fn enter(&self, context: &OperationContext, monitor: &mut EventMonitor) {
        for target in &self.selected {
            context.sender.send(Message {
                correlation_id: context.correlation_id.clone(),
                from: context.client_id.clone(),
                to: target.reply_destination.clone(),
                reply_to: context.reply_to.clone(),
                collection_id: context.collection_id.clone(),
                body: MessageBody::OperationRequest {
                    contributor_id: target.contributor_id.clone(),
                    file_id: context.file_id.clone(),
                    request: context.request.clone(),
                    min_version: PROTOCOL_MIN_VERSION,
                    version: PROTOCOL_VERSION,
                },
            });
            monitor.request_sent(&target.contributor_id);
        }
    }

    fn on_message(
        &mut self,
        message: &Message,
        context: &OperationContext,
        monitor: &mut EventMonitor,
    ) -> Option<ConversationState> {
        match &message.body {
            MessageBody::ProgressResponse {
                contributor_id,
                response_info,
                ..
            } => {
                self.on_progress(contributor_id, response_info.as_ref(), context, monitor);
                None
            }
            MessageBody::FinalResponse {
                contributor_id,
                response_info,
                result,
                ..
            } => self.on_final(contributor_id, response_info.as_ref(), result, context, monitor),
            other => {
                debug!(
                    "[{}] Ignoring {} from '{}' during execution",
                    context.short_id(),
                    other.type_name(),
                    message.from
                );
                None
            }
        }
    }

    fn on_progress(
        &self,
        contributor: &ContributorId,
        info: Option<&ResponseInfo>,
        context: &OperationContext,
        monitor: &mut EventMonitor,
    ) {
        if !self.tracker.expected().contains(contributor) {
            report_reply_error(
                ConversationError::unsolicited(contributor.clone()),
                contributor,
                monitor,
            );
            return;
        }
        if self.tracker.has_responded(contributor) {
            debug!(
                "[{}] Ignoring progress from {} after its final response",
                context.short_id(),
                contributor
            );
            return;
        }
        match info.map(|i| i.response_code) {
            Some(code) if code.is_progress() => monitor.progress(contributor, describe(info)),
            Some(code) => report_reply_error(
                ConversationError::unexpected_code(contributor.clone(), code),
                contributor,
                monitor,
            ),
            None => report_reply_error(
                ConversationError::missing_response_code(contributor.clone()),
                contributor,
                monitor,
            ),
        }
    }

    fn on_final(
        &mut self,
        contributor: &ContributorId,
        info: Option<&ResponseInfo>,
        result: &Option<OperationResult>,
        context: &OperationContext,
        monitor: &mut EventMonitor,
    ) -> Option<ConversationState> {
        let code = match info.map(|i| i.response_code) {
            Some(code) if code.is_final() => code,
            Some(code) => {
                report_reply_error(
                    ConversationError::unexpected_code(contributor.clone(), code),
                    contributor,
                    monitor,
                );
                return None;
            }
            None => {
                report_reply_error(
                    ConversationError::missing_response_code(contributor.clone()),
                    contributor,
                    monitor,
                );
                return None;
            }
        };

        if let Err(error) = self.tracker.record(contributor) {
            report_reply_error(error, contributor, monitor);
            return None;
        }

        if code.is_success() {
            let result = match result {
                Some(r) if r.kind() != context.operation => {
                    monitor.warning(
                        Some(contributor),
                        format!(
                            "Discarding {} result from {} in a {} conversation",
                            r.kind(),
                            contributor,
                            context.operation
                        ),
                    );
                    None
                }
                other => other.clone(),
            };
            monitor.contributor_complete(contributor, result);
        } else {
            monitor.contributor_failed(contributor, Some(code), describe(info));
        }

        if self.tracker.all_responded() {
            let outcome = monitor.complete();
            return Some(ConversationState::finished(outcome));
        }
        None
    }

    fn on_timeout(
        &mut self,
        context: &OperationContext,
        monitor: &mut EventMonitor,
    ) -> ConversationState {
        let outstanding = self.tracker.outstanding();
        for contributor in &outstanding {
            monitor.contributor_failed(
                contributor,
                None,
                "no final response before the operation timeout".to_string(),
            );
        }
        monitor.failed(format!(
            "{} timed out after {:?}, missing final response from: {}",
            context.operation.action_name(),
            context.config.operation_timeout,
            format_contributors(&outstanding)
        ));
        ConversationState::finished(Outcome::Failed)
    }
}

// ==================== Finished ====================

/// Terminal state. Ignores everything delivered to it.
#[derive(Debug)]
pub struct FinishedState {
    outcome: Outcome,
}

impl FinishedState {
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }
}

