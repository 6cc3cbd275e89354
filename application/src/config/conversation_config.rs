//! Conversation timing and outcome policy.
//!
//! [`ConversationConfig`] groups the durations that govern one conversation
//! and the mediator sweep. These are application-layer concerns; the domain
//! bookkeeping never looks at time.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeouts and outcome policy for conversations.
///
/// | Field | Governs |
/// |-------|---------|
/// | `identification_timeout` | identification phase of one conversation |
/// | `operation_timeout` | execution phase of one conversation |
/// | `conversation_timeout` | whole conversation, enforced by the mediator sweep |
/// | `mediator_cleanup_interval` | period of the mediator sweep |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationConfig {
    pub identification_timeout: Duration,
    pub operation_timeout: Duration,
    pub conversation_timeout: Duration,
    pub mediator_cleanup_interval: Duration,
    /// Report `Failed` instead of `Complete` when any contributor failed.
    pub fail_on_contributor_failure: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            identification_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(300),
            conversation_timeout: Duration::from_secs(3600),
            mediator_cleanup_interval: Duration::from_secs(10),
            fail_on_contributor_failure: true,
        }
    }
}

impl ConversationConfig {
    // ==================== Builder Methods ====================

    pub fn with_identification_timeout(mut self, timeout: Duration) -> Self {
        self.identification_timeout = timeout;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_conversation_timeout(mut self, timeout: Duration) -> Self {
        self.conversation_timeout = timeout;
        self
    }

    pub fn with_mediator_cleanup_interval(mut self, interval: Duration) -> Self {
        self.mediator_cleanup_interval = interval;
        self
    }

    pub fn with_fail_on_contributor_failure(mut self, fail: bool) -> Self {
        self.fail_on_contributor_failure = fail;
        self
    }
}
