use crate::core::ids::ContributorId;
use serde::{Deserialize, Serialize};

/// A contributor chosen during identification, with the address its
/// execution request goes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedContributor {
    pub contributor_id: ContributorId,
    pub reply_destination: String,
}

impl SelectedContributor {
    pub fn new(contributor_id: ContributorId, reply_destination: impl Into<String>) -> Self {
        Self {
            contributor_id,
            reply_destination: reply_destination.into(),
        }
    }
}

impl std::fmt::Display for SelectedContributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.contributor_id, self.reply_destination)
    }
}
