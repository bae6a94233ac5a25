//! Capacity policy: a bounded LRU map with eviction accounting.
//!
//! The store knows nothing about TTLs. Expiry is layered on top by the
//! cache through [`EntryTiming`](super::policy::EntryTiming).

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

/// Bounded map that evicts the least recently used key on overflow.
#[derive(Debug)]
pub struct LruStore<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
}

impl<K: Hash + Eq + Clone, V> LruStore<K, V> {
    /// Looks up `key` and marks it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Looks up `key` without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.peek(key)
    }

    /// Inserts or overwrites `key`, returning the key evicted to make room.
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        match self.entries.push(key.clone(), value) {
            Some((evicted, _)) if evicted != key => Some(evicted),
            _ => None,
        }
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.pop(key)
    }

    /// Removes every key for which `predicate` holds and returns how many.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&V) -> bool) -> usize {
        let doomed: Vec<K> =
            self.entries.iter().filter(|(_, v)| predicate(v)).map(|(k, _)| k.clone()).collect();
        for key in &doomed {
            self.entries.pop(key);
        }
        doomed.len()
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }
}

impl<K: Hash + Eq, V> LruStore<K, V> {
    /// Creates an empty store holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self { entries: LruCache::new(capacity) }
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Capacity bound.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}
