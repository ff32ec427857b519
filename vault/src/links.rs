//! The resolved-link index shared with the host.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Link counts from one source document, keyed by target path.
pub type LinkCounts = BTreeMap<String, u32>;

/// Directed, weighted document links: `source → target → count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkIndex {
    links: BTreeMap<String, LinkCounts>,
}

/// The link index as shared between the host and the projector.
pub type SharedLinkIndex = Arc<RwLock<LinkIndex>>;

impl LinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the index for sharing.
    pub fn shared(self) -> SharedLinkIndex {
        Arc::new(RwLock::new(self))
    }

    /// Count of links from `source` to `target`.
    pub fn get(&self, source: &str, target: &str) -> Option<u32> {
        self.links.get(source)?.get(target).copied()
    }

    /// All targets linked from `source`.
    pub fn targets(&self, source: &str) -> Option<&LinkCounts> {
        self.links.get(source)
    }

    /// Ensure `source` has an entry, possibly empty.
    pub fn ensure_source(&mut self, source: &str) -> &mut LinkCounts {
        self.links.entry(source.to_string()).or_default()
    }

    /// Set a count outright.
    pub fn insert(&mut self, source: &str, target: &str, count: u32) {
        self.ensure_source(source).insert(target.to_string(), count);
    }

    /// Add `by` to the count from `source` to `target`, returning the new
    /// count.
    pub fn increment(&mut self, source: &str, target: &str, by: u32) -> u32 {
        let count = self
            .ensure_source(source)
            .entry(target.to_string())
            .or_default();
        *count = count.saturating_add(by);
        *count
    }

    /// Subtract `by` from the count, saturating at zero. A target whose
    /// count reaches zero is dropped; the source entry stays.
    pub fn decrement(&mut self, source: &str, target: &str, by: u32) {
        let Some(targets) = self.links.get_mut(source) else {
            return;
        };
        if let Some(count) = targets.get_mut(target) {
            *count = count.saturating_sub(by);
            if *count == 0 {
                targets.remove(target);
            }
        }
    }

    /// Iterate over `(source, targets)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LinkCounts)> {
        self.links.iter().map(|(source, targets)| (source.as_str(), targets))
    }

    /// Number of source documents.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_increment_and_decrement() {
        let mut index = LinkIndex::new();
        assert_eq!(index.increment("a.md", "refs/x.md", 1), 1);
        assert_eq!(index.increment("a.md", "refs/x.md", 2), 3);

        index.decrement("a.md", "refs/x.md", 5);
        assert_eq!(index.get("a.md", "refs/x.md"), None);
        assert!(index.targets("a.md").is_some_and(BTreeMap::is_empty));

        index.decrement("missing.md", "refs/x.md", 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_serializes_as_nested_map() {
        let mut index = LinkIndex::new();
        index.insert("a.md", "b.md", 2);
        assert_eq!(
            serde_json::to_string(&index).unwrap(),
            r#"{"a.md":{"b.md":2}}"#
        );
    }
}
