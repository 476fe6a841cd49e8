//! Restore snapshots for chunks in configuration view
//!
//! A snapshot is taken when a chunk enters configuration and is consumed
//! when it leaves: committed on preview, written back on cancel.

use chunk_types::{Configuration, Delta};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct ConfigCache {
    snapshots: BTreeMap<Delta, Configuration>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a snapshot, replacing any earlier one
    pub fn save(&mut self, delta: Delta, configuration: Configuration) {
        self.snapshots.insert(delta, configuration);
    }

    pub fn get(&self, delta: Delta) -> Option<&Configuration> {
        self.snapshots.get(&delta)
    }

    /// Removes and returns a snapshot
    pub fn take(&mut self, delta: Delta) -> Option<Configuration> {
        self.snapshots.remove(&delta)
    }

    pub fn discard(&mut self, delta: Delta) -> bool {
        self.snapshots.remove(&delta).is_some()
    }

    pub fn contains(&self, delta: Delta) -> bool {
        self.snapshots.contains_key(&delta)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Drops snapshots for positions no longer present
    pub fn retain(&mut self, mut keep: impl FnMut(Delta) -> bool) {
        self.snapshots.retain(|delta, _| keep(*delta));
    }

    /// Moves every snapshot to the delta its chunk was renumbered to
    pub fn renumber(&mut self, map: impl Fn(Delta) -> Delta) {
        self.snapshots = std::mem::take(&mut self.snapshots)
            .into_iter()
            .map(|(delta, configuration)| (map(delta), configuration))
            .collect();
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_consumes_snapshot() {
        let mut cache = ConfigCache::new();
        cache.save(Delta::new(1), Configuration::new().with("text", "a"));
        assert!(cache.contains(Delta::new(1)));

        let snapshot = cache.take(Delta::new(1)).unwrap();
        assert_eq!(snapshot.get("text"), Some("a"));
        assert!(cache.take(Delta::new(1)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_save_replaces() {
        let mut cache = ConfigCache::new();
        cache.save(Delta::new(0), Configuration::new().with("text", "a"));
        cache.save(Delta::new(0), Configuration::new().with("text", "b"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(Delta::new(0)).unwrap().get("text"), Some("b"));
    }

    #[test]
    fn test_retain() {
        let mut cache = ConfigCache::new();
        cache.save(Delta::new(0), Configuration::new());
        cache.save(Delta::new(5), Configuration::new());
        cache.retain(|delta| delta.get() < 3);
        assert!(cache.contains(Delta::new(0)));
        assert!(!cache.contains(Delta::new(5)));
    }

    #[test]
    fn test_renumber_swaps_positions() {
        let mut cache = ConfigCache::new();
        cache.save(Delta::new(2), Configuration::new().with("text", "two"));
        cache.save(Delta::new(3), Configuration::new().with("text", "three"));

        cache.renumber(|d| match d.get() {
            2 => Delta::new(3),
            3 => Delta::new(2),
            _ => d,
        });
        assert_eq!(cache.get(Delta::new(2)).unwrap().get("text"), Some("three"));
        assert_eq!(cache.get(Delta::new(3)).unwrap().get("text"), Some("two"));
    }
}
