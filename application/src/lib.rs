//! Application layer for bitrelay
//!
//! This crate contains the conversation protocol engine, the operation
//! client use case, port definitions and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod engine;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{ClientSettings, ConversationConfig};
pub use engine::{
    Conversation, ConversationMediator, ConversationPhase, MediatorError, OperationContext,
    Outcome, SweepReport,
};
pub use ports::{
    checksum::{ChecksumError, ChecksumProvider},
    event_recorder::{EventRecorder, NoEventRecorder},
    event_sink::{CompositeEventSink, EventSink, NoEventSink},
    message_bus::{MessageBus, MessageListener, MessageSender, same_listener},
};
pub use use_cases::operation_client::{
    ClientError, DeleteFileInput, OperationClient, PutFileInput, QueryScope, ReplaceFileInput,
};
pub use use_cases::wait::BlockingEventSink;
