//! Checksum provider backed by the `sha2` digests.

mod sha;

pub use sha::Sha2ChecksumProvider;
