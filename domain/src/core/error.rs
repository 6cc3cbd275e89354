//! Domain error types

use crate::core::ids::ContributorId;
use crate::message::ResponseCode;
use thiserror::Error;

/// Errors raised while interpreting replies from contributors.
///
/// Reply-level variants (`UnexpectedResponse`, `DuplicateResponse`) are local
/// to a single reply: the caller logs them and drops that reply. Only
/// `NoSuitableContributor` ends a conversation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Unexpected response from '{contributor}': {reason}")]
    UnexpectedResponse {
        contributor: ContributorId,
        reason: String,
    },

    #[error("Duplicate response from '{0}', the first response is kept")]
    DuplicateResponse(ContributorId),

    #[error("No suitable contributor found among: {}", format_contributors(.candidates))]
    NoSuitableContributor { candidates: Vec<ContributorId> },
}

impl ConversationError {
    /// Reply arrived from a contributor outside the expected set.
    pub fn unsolicited(contributor: ContributorId) -> Self {
        Self::UnexpectedResponse {
            contributor,
            reason: "contributor is not expected to respond".to_string(),
        }
    }

    /// Reply carried no response code.
    pub fn missing_response_code(contributor: ContributorId) -> Self {
        Self::UnexpectedResponse {
            contributor,
            reason: "response info or response code is missing".to_string(),
        }
    }

    /// Reply carried a response code that makes no sense for the phase.
    pub fn unexpected_code(contributor: ContributorId, code: ResponseCode) -> Self {
        Self::UnexpectedResponse {
            contributor,
            reason: format!("response code {} is not valid here", code),
        }
    }
}

/// Comma separated contributor ids, `<none>` for an empty list.
pub fn format_contributors(ids: &[ContributorId]) -> String {
    if ids.is_empty() {
        return "<none>".to_string();
    }
    ids.iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
