//! Identifier value objects.
//!
//! # Identifiers
//! - [`CorrelationId`] - Routing key shared by every message of one conversation
//! - [`ContributorId`] - Identity of a storage contributor (pillar)

use serde::{Deserialize, Serialize};

/// Routing key shared by every message belonging to one conversation.
///
/// Assigned once by the initiating side and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Creates a CorrelationId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new random CorrelationId (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used as a log prefix.
    ///
    /// Everything up to the first `-` found after the fourth character, or the
    /// whole id when there is none.
    pub fn short(&self) -> &str {
        let search_from = self.0.char_indices().nth(4).map(|(i, _)| i);
        match search_from.and_then(|start| self.0[start..].find('-').map(|pos| start + pos)) {
            Some(end) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl<T: Into<String>> From<T> for CorrelationId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a storage contributor (pillar).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContributorId(String);

impl ContributorId {
    /// Creates a ContributorId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for ContributorId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for ContributorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = CorrelationId::generate();
        let b = CorrelationId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_short_id_cuts_at_first_dash() {
        let id = CorrelationId::new("a1b2c3d4-0000-4000-8000-000000000000");
        assert_eq!(id.short(), "a1b2c3d4");
    }

    #[test]
    fn test_short_id_skips_leading_dash() {
        let id = CorrelationId::new("ab-cdef-12");
        assert_eq!(id.short(), "ab-cdef");
    }

    #[test]
    fn test_short_id_without_dash() {
        let id = CorrelationId::new("conversation1");
        assert_eq!(id.short(), "conversation1");
        assert_eq!(CorrelationId::new("ab").short(), "ab");
    }

    #[test]
    fn test_contributor_id_ordering_and_display() {
        let mut ids = vec![ContributorId::new("p2"), ContributorId::new("p1")];
        ids.sort();
        assert_eq!(ids[0].to_string(), "p1");
    }
}
