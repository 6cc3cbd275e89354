//! Application-level configuration.
//!
//! - [`ConversationConfig`]: phase timeouts, conversation timeout, sweep interval
//! - [`ClientSettings`]: client identity and collection addressing

pub mod client_settings;
pub mod conversation_config;

pub use client_settings::ClientSettings;
pub use conversation_config::ConversationConfig;
