//! Simulated reference contributors.
//!
//! - [`SimulatedContributor`]: answers identify and operation requests from
//!   an in-memory file store, with switchable failure behaviour
//! - [`SimulatedCollection`]: one contributor per configured id
//! - [`InMemoryFileExchange`]: the address space file content moves through

mod collection;
mod exchange;
mod simulated;

pub use collection::SimulatedCollection;
pub use exchange::InMemoryFileExchange;
pub use simulated::{
    ContributorBehaviour, IdentifyBehaviour, OperationBehaviour, SimulatedContributor,
};
