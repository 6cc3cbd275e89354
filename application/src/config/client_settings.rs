//! Addressing settings of the operation client.

use bitrelay_domain::ContributorId;
use serde::{Deserialize, Serialize};

/// Who the client is and where its collection lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Sender id stamped on outgoing messages.
    pub client_id: String,
    pub collection_id: String,
    /// Destination the client receives replies on.
    pub receiver_destination: String,
    /// Destination identify requests are broadcast to.
    pub collection_destination: String,
    /// Contributors of the collection.
    pub contributors: Vec<ContributorId>,
}

impl ClientSettings {
    pub fn new(
        client_id: impl Into<String>,
        collection_id: impl Into<String>,
        contributors: Vec<ContributorId>,
    ) -> Self {
        let client_id = client_id.into();
        let collection_id = collection_id.into();
        Self {
            receiver_destination: format!("{}-receiver", client_id),
            collection_destination: format!("{}-topic", collection_id),
            client_id,
            collection_id,
            contributors,
        }
    }

    pub fn with_receiver_destination(mut self, destination: impl Into<String>) -> Self {
        self.receiver_destination = destination.into();
        self
    }

    pub fn with_collection_destination(mut self, destination: impl Into<String>) -> Self {
        self.collection_destination = destination.into();
        self
    }
}
