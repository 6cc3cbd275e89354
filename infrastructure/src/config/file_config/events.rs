//! Event configuration from TOML (`[events]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw event reporting configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEventsConfig {
    /// Report `Failed` when any selected contributor failed
    pub fail_on_contributor_failure: bool,
    /// Append every operation event to this JSONL file
    pub log_file: Option<PathBuf>,
}

impl Default for FileEventsConfig {
    fn default() -> Self {
        Self {
            fail_on_contributor_failure: true,
            log_file: None,
        }
    }
}
