//! Timeout configuration from TOML (`[timeouts]` section)

use bitrelay_application::ConversationConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw timeout configuration from TOML, all values in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTimeoutsConfig {
    pub identification_ms: u64,
    pub operation_ms: u64,
    pub conversation_ms: u64,
    pub mediator_cleanup_interval_ms: u64,
}

impl Default for FileTimeoutsConfig {
    fn default() -> Self {
        let defaults = ConversationConfig::default();
        Self {
            identification_ms: defaults.identification_timeout.as_millis() as u64,
            operation_ms: defaults.operation_timeout.as_millis() as u64,
            conversation_ms: defaults.conversation_timeout.as_millis() as u64,
            mediator_cleanup_interval_ms: defaults.mediator_cleanup_interval.as_millis() as u64,
        }
    }
}

impl FileTimeoutsConfig {
    pub fn to_conversation_config(&self) -> ConversationConfig {
        ConversationConfig::default()
            .with_identification_timeout(Duration::from_millis(self.identification_ms))
            .with_operation_timeout(Duration::from_millis(self.operation_ms))
            .with_conversation_timeout(Duration::from_millis(self.conversation_ms))
            .with_mediator_cleanup_interval(Duration::from_millis(
                self.mediator_cleanup_interval_ms,
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_conversation_config() {
        let config = FileTimeoutsConfig::default();
        assert_eq!(config.identification_ms, 10_000);
        assert_eq!(config.operation_ms, 300_000);
        assert_eq!(config.conversation_ms, 3_600_000);
        assert_eq!(config.mediator_cleanup_interval_ms, 10_000);
    }
}
