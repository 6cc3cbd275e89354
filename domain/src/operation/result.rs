//! Per-contributor results carried by final replies.

use super::kind::OperationKind;
use super::request::ChecksumData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Checksum of one file as reported by a contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChecksum {
    pub file_id: String,
    pub checksum: ChecksumData,
}

/// One entry of a contributor's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrailEvent {
    pub sequence_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    pub actor: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// Result payload of a successful final reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationResult {
    PutFile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum: Option<ChecksumData>,
    },
    GetFile {
        file_address: String,
    },
    DeleteFile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum: Option<ChecksumData>,
    },
    ReplaceFile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum: Option<ChecksumData>,
    },
    GetFileIds {
        file_ids: Vec<String>,
    },
    GetChecksums {
        checksums: Vec<FileChecksum>,
    },
    GetAuditTrails {
        events: Vec<AuditTrailEvent>,
    },
}

impl OperationResult {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationResult::PutFile { .. } => OperationKind::PutFile,
            OperationResult::GetFile { .. } => OperationKind::GetFile,
            OperationResult::DeleteFile { .. } => OperationKind::DeleteFile,
            OperationResult::ReplaceFile { .. } => OperationKind::ReplaceFile,
            OperationResult::GetFileIds { .. } => OperationKind::GetFileIds,
            OperationResult::GetChecksums { .. } => OperationKind::GetChecksums,
            OperationResult::GetAuditTrails { .. } => OperationKind::GetAuditTrails,
        }
    }

    /// One-line summary for console output.
    pub fn summary(&self) -> String {
        match self {
            OperationResult::PutFile { checksum }
            | OperationResult::DeleteFile { checksum }
            | OperationResult::ReplaceFile { checksum } => match checksum {
                Some(c) => format!("{} {}", c.algorithm, c.value),
                None => "no checksum returned".to_string(),
            },
            OperationResult::GetFile { file_address } => format!("delivered to {}", file_address),
            OperationResult::GetFileIds { file_ids } => format!("{} file id(s)", file_ids.len()),
            OperationResult::GetChecksums { checksums } => {
                format!("{} checksum(s)", checksums.len())
            }
            OperationResult::GetAuditTrails { events } => {
                format!("{} audit event(s)", events.len())
            }
        }
    }
}
