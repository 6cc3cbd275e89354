//! Message envelope exchanged between the client and contributors.
//!
//! Every message carries the same routing header; the payload is a single
//! tagged union over the five message kinds of the protocol, so a receiver
//! dispatches once on [`MessageBody`] instead of per concrete message type.

use super::response::{ResponseCode, ResponseInfo};
use crate::core::ids::{ContributorId, CorrelationId};
use crate::operation::{OperationKind, OperationRequest, OperationResult};
use serde::{Deserialize, Serialize};

/// Lowest protocol version this implementation understands.
pub const PROTOCOL_MIN_VERSION: u32 = 1;
/// Protocol version this implementation speaks.
pub const PROTOCOL_VERSION: u32 = 1;

/// A single message on the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub correlation_id: CorrelationId,
    /// Sender identifier (client id or contributor id).
    pub from: String,
    /// Destination address the message is published to.
    pub to: String,
    /// Address replies must be sent to.
    pub reply_to: String,
    pub collection_id: String,
    pub body: MessageBody,
}

impl Message {
    /// Kind of operation the message belongs to.
    pub fn operation(&self) -> OperationKind {
        self.body.operation()
    }

    /// Builds a reply to this message, swapping the addresses.
    pub fn reply(&self, from: impl Into<String>, body: MessageBody) -> Message {
        Message {
            correlation_id: self.correlation_id.clone(),
            from: from.into(),
            to: self.reply_to.clone(),
            reply_to: self.to.clone(),
            collection_id: self.collection_id.clone(),
            body,
        }
    }
}

/// Payload of a [`Message`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    /// Broadcast asking which contributors can perform an operation.
    IdentifyRequest {
        operation: OperationKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_id: Option<String>,
        min_version: u32,
        version: u32,
    },
    /// Answer to an identify request.
    IdentifyResponse {
        operation: OperationKind,
        contributor_id: ContributorId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response_info: Option<ResponseInfo>,
        /// Expected delivery time, used by the fastest-contributor policy.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_to_deliver_ms: Option<u64>,
    },
    /// Targeted request sent to one selected contributor.
    OperationRequest {
        contributor_id: ContributorId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_id: Option<String>,
        request: OperationRequest,
        min_version: u32,
        version: u32,
    },
    /// Intermediate answer during execution.
    ProgressResponse {
        operation: OperationKind,
        contributor_id: ContributorId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response_info: Option<ResponseInfo>,
    },
    /// Final answer during execution.
    FinalResponse {
        operation: OperationKind,
        contributor_id: ContributorId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response_info: Option<ResponseInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<OperationResult>,
    },
}

impl MessageBody {
    pub fn operation(&self) -> OperationKind {
        match self {
            MessageBody::IdentifyRequest { operation, .. }
            | MessageBody::IdentifyResponse { operation, .. }
            | MessageBody::ProgressResponse { operation, .. }
            | MessageBody::FinalResponse { operation, .. } => *operation,
            MessageBody::OperationRequest { request, .. } => request.kind(),
        }
    }

    /// Contributor a response came from, or a request is addressed to.
    pub fn contributor_id(&self) -> Option<&ContributorId> {
        match self {
            MessageBody::IdentifyRequest { .. } => None,
            MessageBody::IdentifyResponse { contributor_id, .. }
            | MessageBody::OperationRequest { contributor_id, .. }
            | MessageBody::ProgressResponse { contributor_id, .. }
            | MessageBody::FinalResponse { contributor_id, .. } => Some(contributor_id),
        }
    }

    pub fn response_code(&self) -> Option<ResponseCode> {
        match self {
            MessageBody::IdentifyResponse { response_info, .. }
            | MessageBody::ProgressResponse { response_info, .. }
            | MessageBody::FinalResponse { response_info, .. } => {
                response_info.as_ref().map(|info| info.response_code)
            }
            _ => None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            MessageBody::IdentifyRequest { .. } | MessageBody::OperationRequest { .. }
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            MessageBody::IdentifyRequest { .. } => "IdentifyRequest",
            MessageBody::IdentifyResponse { .. } => "IdentifyResponse",
            MessageBody::OperationRequest { .. } => "OperationRequest",
            MessageBody::ProgressResponse { .. } => "ProgressResponse",
            MessageBody::FinalResponse { .. } => "FinalResponse",
        }
    }
}
