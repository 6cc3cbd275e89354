//! Operation kinds.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The kind of multi-party operation a conversation carries out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Store a new file at the contributors.
    PutFile,
    /// Fetch a file from one contributor.
    GetFile,
    /// Delete a file.
    DeleteFile,
    /// Replace an existing file with new content.
    ReplaceFile,
    /// List the file ids a contributor holds.
    GetFileIds,
    /// Retrieve checksums for the files a contributor holds.
    GetChecksums,
    /// Retrieve audit trail events.
    GetAuditTrails,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::PutFile,
        OperationKind::GetFile,
        OperationKind::DeleteFile,
        OperationKind::ReplaceFile,
        OperationKind::GetFileIds,
        OperationKind::GetChecksums,
        OperationKind::GetAuditTrails,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::PutFile => "put_file",
            OperationKind::GetFile => "get_file",
            OperationKind::DeleteFile => "delete_file",
            OperationKind::ReplaceFile => "replace_file",
            OperationKind::GetFileIds => "get_file_ids",
            OperationKind::GetChecksums => "get_checksums",
            OperationKind::GetAuditTrails => "get_audit_trails",
        }
    }

    /// Operations that cannot run without a target file id.
    pub fn requires_file_id(&self) -> bool {
        matches!(
            self,
            OperationKind::PutFile
                | OperationKind::GetFile
                | OperationKind::DeleteFile
                | OperationKind::ReplaceFile
        )
    }

    /// Operations that change the state of a contributor.
    pub fn is_modifying(&self) -> bool {
        matches!(
            self,
            OperationKind::PutFile | OperationKind::DeleteFile | OperationKind::ReplaceFile
        )
    }

    /// Human readable name of the execution phase, used in logs and events.
    pub fn action_name(&self) -> &'static str {
        match self {
            OperationKind::PutFile => "Putting file",
            OperationKind::GetFile => "Getting file",
            OperationKind::DeleteFile => "Deleting file",
            OperationKind::ReplaceFile => "Replacing file",
            OperationKind::GetFileIds => "Getting file ids",
            OperationKind::GetChecksums => "Getting checksums",
            OperationKind::GetAuditTrails => "Getting audit trails",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "put_file" | "put" | "store" => Ok(OperationKind::PutFile),
            "get_file" | "get" | "fetch" => Ok(OperationKind::GetFile),
            "delete_file" | "delete" => Ok(OperationKind::DeleteFile),
            "replace_file" | "replace" => Ok(OperationKind::ReplaceFile),
            "get_file_ids" | "list" => Ok(OperationKind::GetFileIds),
            "get_checksums" | "checksums" | "checksum" => Ok(OperationKind::GetChecksums),
            "get_audit_trails" | "audit" | "audit_trails" => Ok(OperationKind::GetAuditTrails),
            _ => Err(format!("unknown operation kind: {}", s)),
        }
    }
}
