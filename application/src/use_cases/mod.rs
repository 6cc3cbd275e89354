//! Use cases (application services)

pub mod operation_client;
pub mod wait;
