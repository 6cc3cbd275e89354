//! Core domain concepts shared across all subdomains.
//!
//! - [`ids::CorrelationId`]: routing key of one conversation
//! - [`ids::ContributorId`]: a storage contributor (pillar)
//! - [`error::ConversationError`]: reply bookkeeping and selection errors

pub mod error;
pub mod ids;
