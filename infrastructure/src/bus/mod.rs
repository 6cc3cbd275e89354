//! In-process message transport.
//!
//! Provides [`InMemoryMessageBus`], a publish/subscribe implementation of the
//! [`MessageBus`](bitrelay_application::MessageBus) port used by the CLI and
//! the integration tests.

mod in_memory;

pub use in_memory::InMemoryMessageBus;
