//! Response codes and response info carried by every reply.

use serde::{Deserialize, Serialize};

/// Closed set of response codes a contributor can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    /// The contributor can perform the operation.
    IdentificationPositive,
    /// The contributor cannot or will not perform the operation.
    IdentificationNegative,
    /// The request was accepted and work has started.
    OperationAcceptedProgress,
    /// Intermediate progress report.
    OperationProgress,
    /// The operation finished successfully.
    OperationCompleted,
    /// Generic failure.
    Failure,
    /// The requested file is not present at the contributor.
    FileNotFound,
    /// The contributor could not parse or accept the request.
    RequestNotUnderstood,
    /// A file with the same id already exists.
    DuplicateFileFailure,
    /// The checksum given for the existing file did not match.
    ExistingFileChecksumFailure,
    /// The checksum given for the new file did not match.
    NewFileChecksumFailure,
    /// The file could not be transferred to or from the given address.
    FileTransferFailure,
}

impl ResponseCode {
    pub fn is_positive_identification(&self) -> bool {
        matches!(self, ResponseCode::IdentificationPositive)
    }

    /// Progress codes keep the contributor outstanding.
    pub fn is_progress(&self) -> bool {
        matches!(
            self,
            ResponseCode::OperationAcceptedProgress | ResponseCode::OperationProgress
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseCode::OperationCompleted)
    }

    /// Whether a reply with this code is a final answer for the execution phase.
    pub fn is_final(&self) -> bool {
        !self.is_progress()
            && !matches!(
                self,
                ResponseCode::IdentificationPositive | ResponseCode::IdentificationNegative
            )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCode::IdentificationPositive => "IDENTIFICATION_POSITIVE",
            ResponseCode::IdentificationNegative => "IDENTIFICATION_NEGATIVE",
            ResponseCode::OperationAcceptedProgress => "OPERATION_ACCEPTED_PROGRESS",
            ResponseCode::OperationProgress => "OPERATION_PROGRESS",
            ResponseCode::OperationCompleted => "OPERATION_COMPLETED",
            ResponseCode::Failure => "FAILURE",
            ResponseCode::FileNotFound => "FILE_NOT_FOUND",
            ResponseCode::RequestNotUnderstood => "REQUEST_NOT_UNDERSTOOD",
            ResponseCode::DuplicateFileFailure => "DUPLICATE_FILE_FAILURE",
            ResponseCode::ExistingFileChecksumFailure => "EXISTING_FILE_CHECKSUM_FAILURE",
            ResponseCode::NewFileChecksumFailure => "NEW_FILE_CHECKSUM_FAILURE",
            ResponseCode::FileTransferFailure => "FILE_TRANSFER_FAILURE",
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Response code plus optional human readable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub response_code: ResponseCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
}

impl ResponseInfo {
    pub fn new(response_code: ResponseCode) -> Self {
        Self {
            response_code,
            response_text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.response_text = Some(text.into());
        self
    }

    pub fn positive_identification() -> Self {
        Self::new(ResponseCode::IdentificationPositive)
    }

    pub fn negative_identification(text: impl Into<String>) -> Self {
        Self::new(ResponseCode::IdentificationNegative).with_text(text)
    }

    pub fn completed() -> Self {
        Self::new(ResponseCode::OperationCompleted)
    }

    /// `CODE` or `CODE: text`, used in failure details.
    pub fn describe(&self) -> String {
        match &self.response_text {
            Some(text) if !text.is_empty() => format!("{}: {}", self.response_code, text),
            _ => self.response_code.to_string(),
        }
    }
}
