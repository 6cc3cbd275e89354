//! In-memory stand-in for the file exchange server.
//!
//! Clients upload content to an address before a put or replace and read
//! it back after a get; contributors do the opposite.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const SCHEME: &str = "mem://";

#[derive(Debug, Default)]
pub struct InMemoryFileExchange {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryFileExchange {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Address under which `name` is exchanged.
    pub fn address_for(name: &str) -> String {
        format!("{}{}", SCHEME, name)
    }

    pub fn upload(&self, address: &str, content: Vec<u8>) {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.insert(address.to_string(), content);
    }

    pub fn download(&self, address: &str) -> Option<Vec<u8>> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.get(address).cloned()
    }

    pub fn remove(&self, address: &str) -> Option<Vec<u8>> {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.remove(address)
    }

    /// Whether `address` belongs to this exchange at all.
    pub fn is_exchange_address(address: &str) -> bool {
        address.starts_with(SCHEME) && address.len() > SCHEME.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_download_remove() {
        let exchange = InMemoryFileExchange::new();
        let address = InMemoryFileExchange::address_for("file1");
        assert_eq!(address, "mem://file1");
        assert!(InMemoryFileExchange::is_exchange_address(&address));
        assert!(!InMemoryFileExchange::is_exchange_address("mem://"));

        exchange.upload(&address, b"data".to_vec());
        assert_eq!(exchange.download(&address).as_deref(), Some(&b"data"[..]));
        assert!(exchange.remove(&address).is_some());
        assert!(exchange.download(&address).is_none());
    }
}
