//! Event monitor: builds, stamps and aggregates the events of one conversation.
//!
//! The monitor never calls the event sink itself. Events accumulate in an
//! outbox that the conversation drains while still holding its lock, which
//! keeps the emission order intact.

use super::context::OperationContext;
use bitrelay_domain::{
    ContributorId, ContributorResult, CorrelationId, OperationEvent, OperationEventKind,
    OperationKind, OperationResult, ResponseCode,
};
use tracing::{debug, info, warn};

/// How a finished conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
    NoContributorFound,
}

#[derive(Debug, Clone)]
struct ContributorFailure {
    contributor: ContributorId,
    code: Option<ResponseCode>,
    info: String,
}

impl std::fmt::Display for ContributorFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({}: {})", self.contributor, code, self.info),
            None => write!(f, "{} ({})", self.contributor, self.info),
        }
    }
}

#[derive(Debug)]
pub struct EventMonitor {
    correlation_id: CorrelationId,
    operation: OperationKind,
    collection_id: String,
    file_id: Option<String>,
    fail_on_contributor_failure: bool,
    completed: Vec<ContributorResult>,
    failed: Vec<ContributorFailure>,
    outbox: Vec<OperationEvent>,
}

impl EventMonitor {
    pub fn new(context: &OperationContext) -> Self {
        Self {
            correlation_id: context.correlation_id.clone(),
            operation: context.operation,
            collection_id: context.collection_id.clone(),
            file_id: context.file_id.clone(),
            fail_on_contributor_failure: context.config.fail_on_contributor_failure,
            completed: Vec::new(),
            failed: Vec::new(),
            outbox: Vec::new(),
        }
    }

    fn short(&self) -> &str {
        self.correlation_id.short()
    }

    fn event(&self, kind: OperationEventKind, info: impl Into<String>) -> OperationEvent {
        OperationEvent::new(
            kind,
            self.correlation_id.clone(),
            self.operation,
            self.collection_id.clone(),
            info,
        )
        .with_file_id(self.file_id.clone())
    }

    fn push(&mut self, event: OperationEvent) {
        self.outbox.push(event);
    }

    /// Drains the events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<OperationEvent> {
        std::mem::take(&mut self.outbox)
    }

    // ==================== Lifecycle Events ====================

    pub fn identify_request_sent(&mut self, addressed: &[ContributorId]) {
        debug!("[{}] Identify request sent to {} contributor(s)", self.short(), addressed.len());
        let info = format!("Identifying contributors for {}", self.operation);
        let event = self.event(OperationEventKind::IdentifyRequestSent, info);
        self.push(event);
    }

    pub fn contributor_identified(&mut self, contributor: &ContributorId, info: String) {
        debug!("[{}] Contributor {} identified", self.short(), contributor);
        let event = self
            .event(OperationEventKind::ContributorIdentified, info)
            .with_contributor(contributor.clone());
        self.push(event);
    }

    pub fn contributors_selected(&mut self, selected: Vec<ContributorId>) {
        let names: Vec<&str> = selected.iter().map(|c| c.as_str()).collect();
        info!("[{}] Selected contributors: {}", self.short(), names.join(", "));
        let info = format!("Selected {} contributor(s)", selected.len());
        let event = self
            .event(OperationEventKind::ContributorsSelected, info)
            .with_selected(selected);
        self.push(event);
    }

    pub fn request_sent(&mut self, contributor: &ContributorId) {
        let info = format!("{} at {}", self.operation.action_name(), contributor);
        let event = self
            .event(OperationEventKind::RequestSent, info)
            .with_contributor(contributor.clone());
        self.push(event);
    }

    pub fn progress(&mut self, contributor: &ContributorId, info: String) {
        let event = self
            .event(OperationEventKind::Progress, info)
            .with_contributor(contributor.clone());
        self.push(event);
    }

    pub fn contributor_complete(
        &mut self,
        contributor: &ContributorId,
        result: Option<OperationResult>,
    ) {
        let info = result
            .as_ref()
            .map(|r| r.summary())
            .unwrap_or_else(|| "completed".to_string());
        debug!("[{}] Contributor {} complete: {}", self.short(), contributor, info);
        self.completed.push(ContributorResult {
            contributor: contributor.clone(),
            result: result.clone(),
        });
        let event = self
            .event(OperationEventKind::ContributorComplete, info)
            .with_contributor(contributor.clone())
            .with_result(result);
        self.push(event);
    }

    pub fn contributor_failed(
        &mut self,
        contributor: &ContributorId,
        code: Option<ResponseCode>,
        info: String,
    ) {
        warn!("[{}] Contributor {} failed: {}", self.short(), contributor, info);
        self.failed.push(ContributorFailure {
            contributor: contributor.clone(),
            code,
            info: info.clone(),
        });
        let event = self
            .event(OperationEventKind::ContributorFailed, info)
            .with_contributor(contributor.clone())
            .with_response_code(code);
        self.push(event);
    }

    /// Non-fatal problem with one reply.
    pub fn warning(&mut self, contributor: Option<&ContributorId>, info: String) {
        warn!("[{}] {}", self.short(), info);
        let mut event = self.event(OperationEventKind::Warning, info);
        event.contributor = contributor.cloned();
        self.push(event);
    }

    pub fn timed_out(&mut self, info: String) {
        warn!("[{}] {}", self.short(), info);
        let event = self.event(OperationEventKind::TimedOut, info);
        self.push(event);
    }

    // ==================== Terminal Events ====================

    /// Ends the execution phase with `Complete`, or with `Failed` when a
    /// contributor failed and failures are fatal.
    pub fn complete(&mut self) -> Outcome {
        if !self.failed.is_empty() && self.fail_on_contributor_failure {
            let details: Vec<String> = self.failed.iter().map(|f| f.to_string()).collect();
            let info = format!(
                "{} contributor(s) failed: {}",
                self.failed.len(),
                details.join(", ")
            );
            self.failed(info);
            return Outcome::Failed;
        }

        let mut info = format!(
            "{} finished: {} contributor(s) completed",
            self.operation.action_name(),
            self.completed.len()
        );
        if !self.failed.is_empty() {
            info.push_str(&format!(", {} failed", self.failed.len()));
        }
        info!("[{}] {}", self.short(), info);
        let event = self
            .event(OperationEventKind::Complete, info)
            .with_contributor_results(self.completed.clone());
        self.push(event);
        Outcome::Completed
    }

    pub fn failed(&mut self, info: String) {
        warn!("[{}] Operation failed: {}", self.short(), info);
        let event = self
            .event(OperationEventKind::Failed, info)
            .with_contributor_results(self.completed.clone());
        self.push(event);
    }

    pub fn no_contributor_found(&mut self, info: String) {
        warn!("[{}] {}", self.short(), info);
        let event = self.event(OperationEventKind::NoContributorFound, info);
        self.push(event);
    }
}
