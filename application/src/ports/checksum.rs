//! Checksum computation port
//!
//! Used only when building request payloads that carry a checksum for
//! validation.

use bitrelay_domain::{ChecksumAlgorithm, ChecksumData};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("Checksum algorithm {0} is not supported")]
    UnsupportedAlgorithm(ChecksumAlgorithm),
}

/// Computes checksums over file content.
pub trait ChecksumProvider: Send + Sync {
    fn checksum(
        &self,
        algorithm: ChecksumAlgorithm,
        content: &[u8],
    ) -> Result<ChecksumData, ChecksumError>;
}
