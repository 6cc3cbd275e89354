//! Wire-level message model: envelope, payload variants and response codes.

pub mod envelope;
pub mod response;

pub use envelope::{Message, MessageBody, PROTOCOL_MIN_VERSION, PROTOCOL_VERSION};
pub use response::{ResponseCode, ResponseInfo};
