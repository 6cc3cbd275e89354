//! Client configuration from TOML (`[client]` section)

use serde::{Deserialize, Serialize};

/// Raw client configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileClientConfig {
    /// Sender id of outgoing messages
    pub client_id: String,
    /// Collection the client operates on
    pub collection_id: String,
    /// Reply destination; `<client_id>-receiver` when unset
    pub receiver_destination: Option<String>,
    /// Broadcast destination; `<collection_id>-topic` when unset
    pub collection_destination: Option<String>,
    /// Contributor ids of the collection
    pub contributors: Vec<String>,
}

impl Default for FileClientConfig {
    fn default() -> Self {
        Self {
            client_id: "bitrelay-client".to_string(),
            collection_id: "default-collection".to_string(),
            receiver_destination: None,
            collection_destination: None,
            contributors: vec![
                "pillar-1".to_string(),
                "pillar-2".to_string(),
                "pillar-3".to_string(),
            ],
        }
    }
}
