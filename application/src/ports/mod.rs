//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod checksum;
pub mod event_recorder;
pub mod event_sink;
pub mod message_bus;
