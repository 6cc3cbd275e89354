//! Domain layer for bitrelay
//!
//! Pure value types and bookkeeping for the conversation protocol. No async,
//! no I/O.
//!
//! # Core Concepts
//!
//! ## Conversation
//!
//! One multi-party operation between a client and a collection of
//! contributors (pillars), identified by a [`CorrelationId`]. Every
//! conversation has two rounds:
//!
//! - **Identification**: a broadcast asking who can perform the operation,
//!   narrowed down by a [`ComponentSelector`]
//! - **Execution**: the operation request sent to each selected contributor,
//!   tracked by a [`ResponseTracker`]
//!
//! ## Events
//!
//! Milestones of a conversation are reported as [`OperationEvent`]s.

pub mod contributor;
pub mod core;
pub mod message;
pub mod operation;

// Re-export commonly used types
pub use contributor::{
    AllContributorsSelector, ComponentSelector, FastestContributorSelector, IdentifyReply,
    ResponseTracker, SelectedContributor, SelectionPolicy, SpecificContributorSelector,
};
pub use core::{
    error::{ConversationError, format_contributors},
    ids::{ContributorId, CorrelationId},
};
pub use message::{
    Message, MessageBody, PROTOCOL_MIN_VERSION, PROTOCOL_VERSION, ResponseCode, ResponseInfo,
};
pub use operation::{
    AuditTrailEvent, ChecksumAlgorithm, ChecksumData, ChecksumSpec, ContributorResult,
    FileChecksum, OperationEvent, OperationEventKind, OperationKind, OperationRequest,
    OperationResult,
};
