//! Operation lifecycle events reported to the caller.
//!
//! Events are immutable records. The engine builds them and hands them to an
//! event sink; it never inspects an event again after emitting it.

use super::kind::OperationKind;
use super::result::OperationResult;
use crate::core::ids::{ContributorId, CorrelationId};
use crate::message::ResponseCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle milestone an [`OperationEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationEventKind {
    /// The identify request was broadcast.
    IdentifyRequestSent,
    /// A contributor answered the identify request positively.
    ContributorIdentified,
    /// The identification phase ended; `selected` lists who will execute.
    ContributorsSelected,
    /// The operation request was sent to one contributor.
    RequestSent,
    /// A contributor reported progress.
    Progress,
    /// A contributor delivered a successful final reply.
    ContributorComplete,
    /// A contributor failed (negative final reply or timeout).
    ContributorFailed,
    /// A non-fatal problem, such as an invalid reply.
    Warning,
    /// The identification timeout fired before every contributor answered.
    TimedOut,
    /// The operation finished successfully.
    Complete,
    /// The operation failed.
    Failed,
    /// Identification finished without any usable contributor.
    NoContributorFound,
}

impl OperationEventKind {
    /// Kinds after which no further events are emitted for the conversation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationEventKind::Complete
                | OperationEventKind::Failed
                | OperationEventKind::NoContributorFound
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OperationEventKind::Failed | OperationEventKind::NoContributorFound
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationEventKind::IdentifyRequestSent => "IdentifyRequestSent",
            OperationEventKind::ContributorIdentified => "ContributorIdentified",
            OperationEventKind::ContributorsSelected => "ContributorsSelected",
            OperationEventKind::RequestSent => "RequestSent",
            OperationEventKind::Progress => "Progress",
            OperationEventKind::ContributorComplete => "ContributorComplete",
            OperationEventKind::ContributorFailed => "ContributorFailed",
            OperationEventKind::Warning => "Warning",
            OperationEventKind::TimedOut => "TimedOut",
            OperationEventKind::Complete => "Complete",
            OperationEventKind::Failed => "Failed",
            OperationEventKind::NoContributorFound => "NoContributorFound",
        }
    }
}

impl std::fmt::Display for OperationEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one contributor, aggregated into `Complete` and `Failed` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorResult {
    pub contributor: ContributorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<OperationResult>,
}

/// A single lifecycle milestone of one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEvent {
    pub kind: OperationEventKind,
    pub correlation_id: CorrelationId,
    pub operation: OperationKind,
    pub collection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Contributor the event concerns, for contributor-level kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributor: Option<ContributorId>,
    /// Response code behind a contributor failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<ResponseCode>,
    /// Free text detail.
    pub info: String,
    /// Result payload of a `ContributorComplete` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<OperationResult>,
    /// Contributors chosen for execution (`ContributorsSelected`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected: Vec<ContributorId>,
    /// Per-contributor results (`Complete`, `Failed`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributor_results: Vec<ContributorResult>,
    pub timestamp: DateTime<Utc>,
}

impl OperationEvent {
    /// Creates an event stamped with the current time.
    pub fn new(
        kind: OperationEventKind,
        correlation_id: CorrelationId,
        operation: OperationKind,
        collection_id: impl Into<String>,
        info: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            correlation_id,
            operation,
            collection_id: collection_id.into(),
            file_id: None,
            contributor: None,
            response_code: None,
            info: info.into(),
            result: None,
            selected: Vec::new(),
            contributor_results: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_file_id(mut self, file_id: Option<String>) -> Self {
        self.file_id = file_id;
        self
    }

    pub fn with_contributor(mut self, contributor: ContributorId) -> Self {
        self.contributor = Some(contributor);
        self
    }

    pub fn with_response_code(mut self, code: Option<ResponseCode>) -> Self {
        self.response_code = code;
        self
    }

    pub fn with_result(mut self, result: Option<OperationResult>) -> Self {
        self.result = result;
        self
    }

    pub fn with_selected(mut self, selected: Vec<ContributorId>) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_contributor_results(mut self, results: Vec<ContributorResult>) -> Self {
        self.contributor_results = results;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    pub fn is_failure(&self) -> bool {
        self.kind.is_failure()
    }
}

impl std::fmt::Display for OperationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.correlation_id.short(), self.kind)?;
        if let Some(contributor) = &self.contributor {
            write!(f, " ({})", contributor)?;
        }
        if !self.info.is_empty() {
            write!(f, ": {}", self.info)?;
        }
        Ok(())
    }
}
