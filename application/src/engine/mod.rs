//! Conversation protocol engine
//!
//! Drives one operation from the identify broadcast to its terminal event:
//!
//! - [`context::OperationContext`]: immutable operation parameters
//! - [`state::ConversationState`]: Identifying → Executing → Finished
//! - [`monitor::EventMonitor`]: event stamping and result aggregation
//! - [`conversation::Conversation`]: one live operation, serialized by a lock
//! - [`mediator::ConversationMediator`]: correlation id routing and the sweep

pub mod context;
pub mod conversation;
pub mod mediator;
pub mod monitor;
pub mod state;

pub use context::OperationContext;
pub use conversation::Conversation;
pub use mediator::{ConversationMediator, MediatorError, SweepReport};
pub use monitor::{EventMonitor, Outcome};
pub use state::{ConversationPhase, ConversationState};
