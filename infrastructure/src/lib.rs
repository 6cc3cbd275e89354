//! Infrastructure layer for bitrelay
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the in-process message bus, simulated
//! contributors, the checksum provider, event logging and recording, and
//! configuration file loading.

pub mod bus;
pub mod checksum;
pub mod config;
pub mod contributor;
pub mod logging;

// Re-export commonly used types
pub use bus::InMemoryMessageBus;
pub use checksum::Sha2ChecksumProvider;
pub use config::{
    ConfigLoader, ConfigValidationError, FileClientConfig, FileConfig, FileEventsConfig,
    FileTimeoutsConfig,
};
pub use contributor::{
    ContributorBehaviour, IdentifyBehaviour, InMemoryFileExchange, OperationBehaviour,
    SimulatedCollection, SimulatedContributor,
};
pub use logging::{JsonlEventRecorder, RecordingEventSink, TracingEventSink};
