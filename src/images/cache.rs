//! Cost-bounded LRU store for decoded thumbnails.

use std::collections::HashMap;
use std::sync::Arc;

use super::{CacheKey, SharedThumbnail};

/// Resident cache entry
#[derive(Clone)]
pub struct CacheEntry {
    /// The decoded thumbnail
    pub thumbnail: SharedThumbnail,
    /// Decoded size in bytes
    pub cost: usize,
    /// Logical clock value of the last access (for LRU eviction)
    last_access: u64,
}

/// LRU map bounded by both total cost and entry count.
///
/// Not thread-safe on its own; `ImageCache` keeps it behind its lock.
pub struct LruStore {
    entries: HashMap<CacheKey, CacheEntry>,
    max_total_cost: usize,
    max_count: usize,
    total_cost: usize,
    clock: u64,
}

impl LruStore {
    /// Create an empty store with the given bounds
    pub fn new(max_total_cost: usize, max_count: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_total_cost,
            max_count,
            total_cost: 0,
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Get an entry and mark it most recently used
    pub fn get(&mut self, key: &CacheKey) -> Option<SharedThumbnail> {
        let now = self.tick();
        self.entries.get_mut(key).map(|entry| {
            entry.last_access = now;
            Arc::clone(&entry.thumbnail)
        })
    }

    /// Check if a key is resident
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a thumbnail, evicting least recently used entries until both
    /// bounds hold. Returns the evicted keys, oldest first.
    ///
    /// A thumbnail that alone exceeds the cost bound is not stored.
    pub fn insert(&mut self, key: CacheKey, thumbnail: SharedThumbnail) -> Vec<CacheKey> {
        let cost = thumbnail.cost;
        if cost > self.max_total_cost || self.max_count == 0 {
            tracing::debug!(key = %key, cost, "Thumbnail exceeds cache bounds, not storing");
            return Vec::new();
        }

        self.remove(&key);

        let mut evicted = Vec::new();
        while self.entries.len() + 1 > self.max_count
            || self.total_cost + cost > self.max_total_cost
        {
            match self.evict_oldest() {
                Some(old) => evicted.push(old),
                None => break,
            }
        }

        let last_access = self.tick();
        self.total_cost += cost;
        self.entries.insert(
            key,
            CacheEntry {
                thumbnail,
                cost,
                last_access,
            },
        );

        evicted
    }

    /// Remove a single entry
    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.total_cost -= entry.cost;
        Some(entry)
    }

    /// Remove every size cached for `url`. Returns how many entries went.
    pub fn remove_url(&mut self, url: &str) -> usize {
        let keys: Vec<CacheKey> = self
            .entries
            .keys()
            .filter(|key| key.url == url)
            .cloned()
            .collect();
        for key in &keys {
            self.remove(key);
        }
        keys.len()
    }

    /// Evict the least recently used entry
    fn evict_oldest(&mut self) -> Option<CacheKey> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone())?;
        self.remove(&oldest);
        Some(oldest)
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_cost = 0;
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of resident entry costs
    pub const fn total_cost(&self) -> usize {
        self.total_cost
    }

    /// Cost bound
    pub const fn max_total_cost(&self) -> usize {
        self.max_total_cost
    }

    /// Count bound
    pub const fn max_count(&self) -> usize {
        self.max_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::Thumbnail;
    use image::DynamicImage;

    /// Luma thumbnail costing exactly `cost` bytes
    fn thumb(cost: u32) -> SharedThumbnail {
        Arc::new(Thumbnail::new(DynamicImage::new_luma8(cost, 1)))
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::new(name, 10, 10)
    }

    #[test]
    fn test_get_after_insert() {
        let mut store = LruStore::new(100, 10);
        store.insert(key("a"), thumb(10));

        assert!(store.get(&key("a")).is_some());
        assert!(store.get(&key("b")).is_none());
        assert_eq!(store.total_cost(), 10);
    }

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let mut store = LruStore::new(1000, 3);
        store.insert(key("a"), thumb(1));
        store.insert(key("b"), thumb(1));
        store.insert(key("c"), thumb(1));

        store.get(&key("a"));
        let evicted = store.insert(key("d"), thumb(1));

        assert_eq!(evicted, vec![key("b")]);
        assert!(store.contains(&key("a")));
        assert!(store.contains(&key("c")));
        assert!(store.contains(&key("d")));
    }

    #[test]
    fn test_contains_does_not_promote() {
        let mut store = LruStore::new(1000, 2);
        store.insert(key("a"), thumb(1));
        store.insert(key("b"), thumb(1));

        assert!(store.contains(&key("a")));
        let evicted = store.insert(key("c"), thumb(1));

        assert_eq!(evicted, vec![key("a")]);
    }

    #[test]
    fn test_cost_bound_evicts_several() {
        let mut store = LruStore::new(100, 10);
        store.insert(key("a"), thumb(40));
        store.insert(key("b"), thumb(40));
        store.insert(key("c"), thumb(20));

        let evicted = store.insert(key("d"), thumb(70));

        assert_eq!(evicted, vec![key("a"), key("b")]);
        assert_eq!(store.total_cost(), 90);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_bounds_hold_after_every_insert() {
        let mut store = LruStore::new(500, 7);
        for i in 0..200u32 {
            let cost = (i * 37) % 180 + 1;
            store.insert(CacheKey::new(&format!("u{}", i % 23), cost, 1), thumb(cost));

            assert!(store.total_cost() <= store.max_total_cost());
            assert!(store.len() <= store.max_count());
            let sum: usize = store.entries.values().map(|e| e.cost).sum();
            assert_eq!(sum, store.total_cost());
        }
    }

    #[test]
    fn test_oversized_entry_not_stored() {
        let mut store = LruStore::new(50, 10);
        store.insert(key("a"), thumb(10));

        let evicted = store.insert(key("big"), thumb(51));

        assert!(evicted.is_empty());
        assert!(!store.contains(&key("big")));
        assert!(store.contains(&key("a")));
    }

    #[test]
    fn test_reinsert_replaces_cost() {
        let mut store = LruStore::new(100, 10);
        store.insert(key("a"), thumb(30));
        store.insert(key("a"), thumb(20));

        assert_eq!(store.len(), 1);
        assert_eq!(store.total_cost(), 20);
    }

    #[test]
    fn test_remove_url_drops_every_size() {
        let mut store = LruStore::new(1000, 10);
        store.insert(CacheKey::new("u", 10, 10), thumb(1));
        store.insert(CacheKey::new("u", 20, 20), thumb(2));
        store.insert(CacheKey::new("v", 10, 10), thumb(4));

        assert_eq!(store.remove_url("u"), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_cost(), 4);
    }
}
