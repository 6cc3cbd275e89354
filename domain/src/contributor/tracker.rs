//! Response bookkeeping for one conversation phase.

use crate::core::error::ConversationError;
use crate::core::ids::ContributorId;
use std::collections::HashSet;

/// Tracks which contributors are expected to answer in a phase and which of
/// them have not answered yet.
///
/// A contributor moves from outstanding to responded at most once. A fresh
/// tracker is created for every phase.
#[derive(Debug, Clone)]
pub struct ResponseTracker {
    expected: Vec<ContributorId>,
    outstanding: HashSet<ContributorId>,
}

impl ResponseTracker {
    /// Creates a tracker expecting one reply from each given contributor.
    ///
    /// Repeated ids are collapsed; the first occurrence fixes the order.
    pub fn new(expected: impl IntoIterator<Item = ContributorId>) -> Self {
        let mut seen = HashSet::new();
        let expected: Vec<ContributorId> = expected
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self {
            outstanding: seen,
            expected,
        }
    }

    /// Records a reply from `contributor`.
    ///
    /// Fails without changing any state when the contributor is not expected
    /// or has already been recorded.
    pub fn record(&mut self, contributor: &ContributorId) -> Result<(), ConversationError> {
        if self.outstanding.remove(contributor) {
            return Ok(());
        }
        if self.expected.contains(contributor) {
            Err(ConversationError::DuplicateResponse(contributor.clone()))
        } else {
            Err(ConversationError::unsolicited(contributor.clone()))
        }
    }

    pub fn all_responded(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Contributors that have not answered yet, in expected order.
    pub fn outstanding(&self) -> Vec<ContributorId> {
        self.expected
            .iter()
            .filter(|id| self.outstanding.contains(*id))
            .cloned()
            .collect()
    }

    pub fn has_responded(&self, contributor: &ContributorId) -> bool {
        self.expected.contains(contributor) && !self.outstanding.contains(contributor)
    }

    pub fn expected(&self) -> &[ContributorId] {
        &self.expected
    }
}
