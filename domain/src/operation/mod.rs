//! Operation domain
//!
//! What a conversation does once contributors are selected, and what it
//! reports back:
//!
//! - [`kind::OperationKind`]: the seven operation kinds
//! - [`request::OperationRequest`]: execution-phase request payloads
//! - [`result::OperationResult`]: per-contributor results of final replies
//! - [`event::OperationEvent`]: lifecycle events delivered to the caller

pub mod event;
pub mod kind;
pub mod request;
pub mod result;

pub use event::{ContributorResult, OperationEvent, OperationEventKind};
pub use kind::OperationKind;
pub use request::{ChecksumAlgorithm, ChecksumData, ChecksumSpec, OperationRequest};
pub use result::{AuditTrailEvent, FileChecksum, OperationResult};
