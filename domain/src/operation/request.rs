//! Operation-specific request payloads sent during the execution phase.

use super::kind::OperationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Digest algorithm used for checksums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChecksumAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumAlgorithm::Sha256 => write!(f, "SHA256"),
            ChecksumAlgorithm::Sha512 => write!(f, "SHA512"),
        }
    }
}

/// Which kind of checksum a contributor should calculate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChecksumSpec {
    pub algorithm: ChecksumAlgorithm,
}

impl ChecksumSpec {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        Self { algorithm }
    }
}

/// A calculated checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumData {
    pub algorithm: ChecksumAlgorithm,
    /// Lowercase hex digest.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_at: Option<DateTime<Utc>>,
}

impl ChecksumData {
    pub fn new(algorithm: ChecksumAlgorithm, value: impl Into<String>) -> Self {
        Self {
            algorithm,
            value: value.into(),
            calculated_at: None,
        }
    }

    pub fn calculated_now(mut self) -> Self {
        self.calculated_at = Some(Utc::now());
        self
    }

    /// Compares algorithm and digest, ignoring the calculation time.
    pub fn matches(&self, other: &ChecksumData) -> bool {
        self.algorithm == other.algorithm && self.value.eq_ignore_ascii_case(&other.value)
    }
}

/// Request payload for the execution phase, one variant per operation kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationRequest {
    PutFile {
        /// Where the contributor downloads the file from.
        file_address: String,
        file_size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum_for_validation: Option<ChecksumData>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum_request: Option<ChecksumSpec>,
    },
    GetFile {
        /// Where the contributor uploads the file to.
        file_address: String,
    },
    DeleteFile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum_for_validation: Option<ChecksumData>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum_request: Option<ChecksumSpec>,
    },
    ReplaceFile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum_for_existing_file: Option<ChecksumData>,
        new_file_address: String,
        new_file_size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum_for_new_file: Option<ChecksumData>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum_request: Option<ChecksumSpec>,
    },
    GetFileIds,
    GetChecksums {
        checksum_spec: ChecksumSpec,
    },
    GetAuditTrails {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_sequence_number: Option<u64>,
    },
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::PutFile { .. } => OperationKind::PutFile,
            OperationRequest::GetFile { .. } => OperationKind::GetFile,
            OperationRequest::DeleteFile { .. } => OperationKind::DeleteFile,
            OperationRequest::ReplaceFile { .. } => OperationKind::ReplaceFile,
            OperationRequest::GetFileIds => OperationKind::GetFileIds,
            OperationRequest::GetChecksums { .. } => OperationKind::GetChecksums,
            OperationRequest::GetAuditTrails { .. } => OperationKind::GetAuditTrails,
        }
    }
}
