//! Fixed-capacity LRU map with per-key lifecycle tracking.
//!
//! Recency and eviction come from `lru::LruCache`. The state map outlives
//! the entries so a key can report that it was evicted or cleared.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use ::lru::LruCache;
use serde::{Deserialize, Serialize};

/// Lifecycle of one cache key: absent, loading, cached, then evicted or cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Absent,
    Loading,
    Cached,
    Evicted,
    Cleared,
}

#[derive(Debug)]
pub(crate) struct LruState<V> {
    entries: LruCache<String, V>,
    states: HashMap<String, EntryState>,
}

impl<V: Clone> LruState<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            states: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Look up and promote to most-recently-used
    pub fn get(&mut self, key: &str) -> Option<V> {
        self.entries.get(key).cloned()
    }

    /// Insert as most-recently-used, returning the key evicted to make room
    pub fn insert(&mut self, key: &str, value: V) -> Option<String> {
        let evicted = match self.entries.push(key.to_string(), value) {
            // Same key replaced in place
            Some((old, _)) if old == key => None,
            Some((oldest, _)) => {
                self.states.insert(oldest.clone(), EntryState::Evicted);
                Some(oldest)
            }
            None => None,
        };
        self.states.insert(key.to_string(), EntryState::Cached);
        evicted
    }

    /// Mark a key as being hydrated
    pub fn mark_loading(&mut self, key: &str) {
        if !self.entries.contains(key) {
            self.states.insert(key.to_string(), EntryState::Loading);
        }
    }

    /// Undo `mark_loading` after a failed hydrate
    pub fn restore(&mut self, key: &str, previous: EntryState) {
        if self.states.get(key) == Some(&EntryState::Loading) {
            match previous {
                EntryState::Absent => {
                    self.states.remove(key);
                }
                other => {
                    self.states.insert(key.to_string(), other);
                }
            }
        }
    }

    /// Drop every entry, marking cached keys as cleared
    pub fn clear(&mut self) {
        for (key, _) in self.entries.iter() {
            self.states.insert(key.clone(), EntryState::Cleared);
        }
        self.entries.clear();
    }

    /// Forget every entry and every recorded state
    pub fn reset(&mut self) {
        self.entries.clear();
        self.states.clear();
    }

    pub fn state(&self, key: &str) -> EntryState {
        self.states.get(key).copied().unwrap_or(EntryState::Absent)
    }

    /// Keys from least to most recently used
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.entries.iter().rev().map(|(key, _)| key.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_beyond_capacity_evicts_lru_once() {
        let mut lru = LruState::new(3);
        assert_eq!(lru.insert("a", 1), None);
        assert_eq!(lru.insert("b", 2), None);
        assert_eq!(lru.insert("c", 3), None);

        // Touch "a" so "b" becomes the oldest
        assert_eq!(lru.get("a"), Some(1));

        assert_eq!(lru.insert("d", 4), Some("b".to_string()));
        assert_eq!(lru.len(), 3);
        assert_eq!(lru.state("b"), EntryState::Evicted);
        assert_eq!(lru.get("b"), None);
        assert_eq!(lru.keys_by_recency(), vec!["c", "a", "d"]);
    }

    #[test]
    fn test_reinsert_existing_key_does_not_evict() {
        let mut lru = LruState::new(2);
        lru.insert("a", 1);
        lru.insert("b", 2);
        assert_eq!(lru.insert("a", 10), None);
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.get("a"), Some(10));
    }

    #[test]
    fn test_zero_capacity_holds_one_entry() {
        let mut lru = LruState::new(0);
        assert_eq!(lru.capacity(), 1);
        lru.insert("a", 1);
        assert_eq!(lru.insert("b", 2), Some("a".to_string()));
        assert_eq!(lru.keys_by_recency(), vec!["b"]);
    }

    #[test]
    fn test_lifecycle_states() {
        let mut lru = LruState::new(1);
        assert_eq!(lru.state("a"), EntryState::Absent);

        lru.mark_loading("a");
        assert_eq!(lru.state("a"), EntryState::Loading);
        lru.restore("a", EntryState::Absent);
        assert_eq!(lru.state("a"), EntryState::Absent);

        lru.mark_loading("a");
        lru.insert("a", 1);
        assert_eq!(lru.state("a"), EntryState::Cached);

        lru.insert("b", 2);
        assert_eq!(lru.state("a"), EntryState::Evicted);

        // An evicted key only returns to cached through a fresh insert
        assert_eq!(lru.get("a"), None);
        assert_eq!(lru.state("a"), EntryState::Evicted);

        lru.clear();
        assert_eq!(lru.state("b"), EntryState::Cleared);
        assert_eq!(lru.len(), 0);

        lru.reset();
        assert_eq!(lru.state("b"), EntryState::Absent);
    }
}
