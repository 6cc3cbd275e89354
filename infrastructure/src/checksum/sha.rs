use bitrelay_application::{ChecksumError, ChecksumProvider};
use bitrelay_domain::{ChecksumAlgorithm, ChecksumData};
use sha2::{Digest, Sha256, Sha512};

/// Lowercase hex SHA-256 / SHA-512 digests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha2ChecksumProvider;

impl Sha2ChecksumProvider {
    pub fn digest(algorithm: ChecksumAlgorithm, content: &[u8]) -> String {
        match algorithm {
            ChecksumAlgorithm::Sha256 => hex::encode(Sha256::digest(content)),
            ChecksumAlgorithm::Sha512 => hex::encode(Sha512::digest(content)),
        }
    }
}

impl ChecksumProvider for Sha2ChecksumProvider {
    fn checksum(
        &self,
        algorithm: ChecksumAlgorithm,
        content: &[u8],
    ) -> Result<ChecksumData, ChecksumError> {
        Ok(ChecksumData::new(algorithm, Self::digest(algorithm, content)).calculated_now())
    }
}
