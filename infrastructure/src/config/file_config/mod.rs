//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application-level
//! settings by [`FileConfig::conversation_config`] and
//! [`FileConfig::client_settings`].

mod client;
mod events;
mod timeouts;

pub use client::FileClientConfig;
pub use events::FileEventsConfig;
pub use timeouts::FileTimeoutsConfig;

use bitrelay_application::{ClientSettings, ConversationConfig};
use bitrelay_domain::ContributorId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("{0} cannot be 0")]
    ZeroTimeout(&'static str),

    #[error(
        "timeouts.conversation_ms ({conversation_ms}) must exceed identification_ms + operation_ms ({phases_ms})"
    )]
    ConversationTimeoutTooShort { conversation_ms: u64, phases_ms: u64 },

    #[error("{0} cannot be empty")]
    EmptyId(&'static str),

    #[error("client.contributors lists '{0}' more than once")]
    DuplicateContributor(String),

    #[error("client.contributors cannot be empty")]
    NoContributors,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Client identity and collection addressing
    pub client: FileClientConfig,
    /// Phase, conversation and sweep timeouts
    pub timeouts: FileTimeoutsConfig,
    /// Event reporting settings
    pub events: FileEventsConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut issues = Vec::new();

        // 1. Timeouts
        let t = &self.timeouts;
        for (field, value) in [
            ("timeouts.identification_ms", t.identification_ms),
            ("timeouts.operation_ms", t.operation_ms),
            ("timeouts.conversation_ms", t.conversation_ms),
            (
                "timeouts.mediator_cleanup_interval_ms",
                t.mediator_cleanup_interval_ms,
            ),
        ] {
            if value == 0 {
                issues.push(ConfigValidationError::ZeroTimeout(field));
            }
        }
        let phases_ms = t.identification_ms.saturating_add(t.operation_ms);
        if t.conversation_ms > 0 && t.conversation_ms <= phases_ms {
            issues.push(ConfigValidationError::ConversationTimeoutTooShort {
                conversation_ms: t.conversation_ms,
                phases_ms,
            });
        }

        // 2. Identifiers
        let c = &self.client;
        if c.client_id.trim().is_empty() {
            issues.push(ConfigValidationError::EmptyId("client.client_id"));
        }
        if c.collection_id.trim().is_empty() {
            issues.push(ConfigValidationError::EmptyId("client.collection_id"));
        }

        // 3. Contributors
        if c.contributors.is_empty() {
            issues.push(ConfigValidationError::NoContributors);
        }
        let mut seen = HashSet::new();
        for contributor in &c.contributors {
            if contributor.trim().is_empty() {
                issues.push(ConfigValidationError::EmptyId("client.contributors"));
            } else if !seen.insert(contributor.as_str()) {
                issues.push(ConfigValidationError::DuplicateContributor(
                    contributor.clone(),
                ));
            }
        }

        issues
    }

    pub fn conversation_config(&self) -> ConversationConfig {
        self.timeouts
            .to_conversation_config()
            .with_fail_on_contributor_failure(self.events.fail_on_contributor_failure)
    }

    pub fn client_settings(&self) -> ClientSettings {
        let c = &self.client;
        let contributors = c
            .contributors
            .iter()
            .map(|id| ContributorId::new(id.trim()))
            .collect();
        let mut settings = ClientSettings::new(&c.client_id, &c.collection_id, contributors);
        if let Some(destination) = &c.receiver_destination {
            settings = settings.with_receiver_destination(destination);
        }
        if let Some(destination) = &c.collection_destination {
            settings = settings.with_collection_destination(destination);
        }
        settings
    }
}
