//! Overlay identifiers and the generators that produce them.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Opaque identifier of an open overlay.
///
/// Ids produced by an [`IdGenerator`] are unique within a scope. Arbitrary
/// strings can be turned into ids for embedding and tests.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct OverlayId(String);

impl OverlayId {
    /// Create a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OverlayId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OverlayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OverlayId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OverlayId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Source of fresh overlay ids.
pub trait IdGenerator: Send + Sync {
    /// Produce an id not handed out before by this generator.
    fn next_id(&self) -> OverlayId;
}

/// Random v4 UUID ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> OverlayId {
        OverlayId::new()
    }
}

/// Counter-based ids of the form `{prefix}-{n}`, starting at 1.
///
/// Deterministic, which keeps logs and test assertions readable.
#[derive(Debug)]
pub struct SequentialGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialGenerator {
    /// Create a generator with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialGenerator {
    fn next_id(&self) -> OverlayId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        OverlayId(format!("{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_uuid_ids_are_unique() {
        let generator = UuidGenerator;
        let ids: HashSet<_> = (0..256).map(|_| generator.next_id()).collect();
        assert_eq!(ids.len(), 256);
    }

    #[test]
    fn test_sequential_ids() {
        let generator = SequentialGenerator::new("modal");
        assert_eq!(generator.next_id().as_str(), "modal-1");
        assert_eq!(generator.next_id().as_str(), "modal-2");
        assert_eq!(generator.next_id().to_string(), "modal-3");
    }

    #[test]
    fn test_id_from_str() {
        let id = OverlayId::from("first");
        assert_eq!(id, OverlayId::from(String::from("first")));
        assert_eq!(id.as_str(), "first");
    }
}
