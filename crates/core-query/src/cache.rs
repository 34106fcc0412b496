//! Scoped prefix-search cache.
//!
//! One cache per composing component (a session), created with it and
//! cleared on dispose; there is no process-wide instance. Entries are keyed by
//! the exact prefix sent to the directory and evicted least-recently-used once
//! `capacity` is reached. Capacity 0 disables caching entirely.

use ahash::AHashMap;
use core_state::UserCandidate;
use std::collections::VecDeque;
use tracing::trace;

#[derive(Debug, Default)]
pub struct SearchCache {
    capacity: usize,
    entries: AHashMap<String, Vec<UserCandidate>>,
    recency: VecDeque<String>, // front = least recently used
}

impl SearchCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: AHashMap::with_capacity(capacity),
            recency: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, prefix: &str) -> Option<Vec<UserCandidate>> {
        let hit = self.entries.get(prefix)?.clone();
        self.touch(prefix);
        trace!(target: "query.cache", prefix_len = prefix.len(), results = hit.len(), "cache_hit");
        Some(hit)
    }

    pub fn insert(&mut self, prefix: &str, results: Vec<UserCandidate>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(prefix.to_string(), results).is_some() {
            self.touch(prefix);
            return;
        }
        self.recency.push_back(prefix.to_string());
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.recency.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            trace!(target: "query.cache", evicted_len = oldest.len(), "cache_evict");
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn touch(&mut self, prefix: &str) {
        if let Some(pos) = self.recency.iter().position(|p| p == prefix)
            && let Some(key) = self.recency.remove(pos)
        {
            self.recency.push_back(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> Vec<UserCandidate> {
        vec![UserCandidate::new(id, id, "")]
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = SearchCache::new(2);
        cache.insert("a", user("1"));
        cache.insert("b", user("2"));
        assert!(cache.get("a").is_some()); // "b" is now the oldest
        cache.insert("c", user("3"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn overwrite_keeps_single_entry() {
        let mut cache = SearchCache::new(2);
        cache.insert("a", user("1"));
        cache.insert("a", user("9"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap()[0].user_id, "9");
    }

    #[test]
    fn zero_capacity_disables() {
        let mut cache = SearchCache::new(0);
        cache.insert("a", user("1"));
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn empty_prefix_is_a_valid_key() {
        let mut cache = SearchCache::new(4);
        cache.insert("", user("all"));
        assert_eq!(cache.get("").unwrap().len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
