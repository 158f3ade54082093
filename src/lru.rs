//! Approximate-LRU cache with TTL
//!
//! Backed by an insertion-ordered map: a `set` or a live `get` removes the
//! key and re-inserts it at the back, so the front of the map is always the
//! least-recently-used entry and eviction is a pop from the front. This gives
//! O(1) amortized LRU without a separate linked list.
//!
//! TTL is checked lazily on `get`/`has`; a periodic [`LruCache::cleanup_expired`]
//! sweep reclaims entries nobody asks for. Memory pressure is handled by
//! [`LruCache::optimize_memory`], which evicts from the front until the
//! estimated resident bytes drop under the configured watermark.

use crate::clock::ClockRef;
use crate::entry::{CacheEntry, EntryMetadata};
use crate::error::Result;
use crate::stats::{CacheStats, StatsSnapshot};
use bytes::Bytes;
use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

/// Single-tier approximate-LRU cache
pub struct LruCache {
    /// Entries in recency order (front = oldest, back = newest)
    entries: IndexMap<String, CacheEntry>,
    max_size: usize,
    default_ttl_ms: u64,
    memory_threshold: f64,
    memory_budget_bytes: u64,
    clock: ClockRef,
    stats: CacheStats,
}

impl LruCache {
    /// Create a cache bounded to `max_size` entries
    pub fn new(max_size: usize, default_ttl_ms: u64, clock: ClockRef) -> Self {
        Self {
            entries: IndexMap::with_capacity(max_size.max(1).min(4096)),
            max_size: max_size.max(1),
            default_ttl_ms,
            memory_threshold: 0.8,
            memory_budget_bytes: 64 * 1024 * 1024,
            clock,
            stats: CacheStats::new(),
        }
    }

    /// Set the resident-byte watermark used by [`Self::optimize_memory`]
    pub fn with_memory_budget(mut self, threshold: f64, budget_bytes: u64) -> Self {
        self.memory_threshold = threshold.clamp(0.0, 1.0);
        self.memory_budget_bytes = budget_bytes;
        self
    }

    /// Look up a key, refreshing its recency on a live hit
    pub fn get(&mut self, key: &str) -> Option<Bytes> {
        let now = self.clock.now_ms();

        let Some(mut entry) = self.entries.shift_remove(key) else {
            self.stats.record_miss();
            return None;
        };

        if entry.is_expired(now) {
            self.stats.sub_resident_bytes(entry.estimated_bytes(key));
            self.stats.record_expiration();
            self.stats.record_miss();
            return None;
        }

        entry.record_access(now);
        let value = entry.value.clone();
        self.entries.insert(key.to_string(), entry);
        self.stats.record_hit();
        Some(value)
    }

    /// Store a value. The key becomes the most recent entry; when the cache
    /// is full the oldest entry is evicted first.
    pub fn set(&mut self, key: &str, value: Bytes, ttl_ms: Option<u64>) -> bool {
        let now = self.clock.now_ms();
        let ttl = ttl_ms.unwrap_or(self.default_ttl_ms);

        if let Some(old) = self.entries.shift_remove(key) {
            self.stats.sub_resident_bytes(old.estimated_bytes(key));
        } else if self.entries.len() >= self.max_size {
            self.evict_oldest();
        }

        let entry = CacheEntry::new(value, now, Some(ttl));
        self.stats.add_resident_bytes(entry.estimated_bytes(key));
        self.entries.insert(key.to_string(), entry);
        self.stats.record_set();
        true
    }

    /// Check for a live entry without counting a hit. Expired entries found
    /// here are reclaimed and counted as a miss.
    pub fn has(&mut self, key: &str) -> bool {
        let now = self.clock.now_ms();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return false,
        };

        if expired {
            if let Some(removed) = self.entries.shift_remove(key) {
                self.stats.sub_resident_bytes(removed.estimated_bytes(key));
            }
            self.stats.record_expiration();
            self.stats.record_miss();
            return false;
        }
        true
    }

    /// Delete one key
    pub fn delete(&mut self, key: &str) -> bool {
        match self.remove_entry(key) {
            Some(_) => {
                self.stats.record_delete();
                true
            }
            None => false,
        }
    }

    /// Delete every key matching `pattern` in a single pass
    pub fn delete_pattern(&mut self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern)?;
        let matching: Vec<String> = self
            .entries
            .keys()
            .filter(|k| regex.is_match(k))
            .cloned()
            .collect();

        for key in &matching {
            if self.remove_entry(key).is_some() {
                self.stats.record_delete();
            }
        }

        debug!(pattern, removed = matching.len(), "pattern delete");
        Ok(matching.len())
    }

    /// Refresh a live entry's TTL and recency without counting a hit
    pub fn touch(&mut self, key: &str, ttl_ms: Option<u64>) -> bool {
        let now = self.clock.now_ms();

        let Some(mut entry) = self.entries.shift_remove(key) else {
            return false;
        };

        if entry.is_expired(now) {
            self.stats.sub_resident_bytes(entry.estimated_bytes(key));
            self.stats.record_expiration();
            return false;
        }

        entry.expires_at = Some(now.saturating_add(ttl_ms.unwrap_or(self.default_ttl_ms)));
        entry.last_accessed = now;
        self.entries.insert(key.to_string(), entry);
        true
    }

    /// Drop everything; returns the number of entries removed
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.stats.bytes_resident.store(0, std::sync::atomic::Ordering::Relaxed);
        count
    }

    /// Current keys, oldest first
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Bookkeeping view of one entry
    pub fn metadata(&self, key: &str) -> Option<EntryMetadata> {
        self.entries
            .get(key)
            .map(|entry| EntryMetadata::from_entry(key, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Resize the cache, evicting oldest entries if it shrinks
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
        while self.entries.len() > self.max_size {
            self.evict_oldest();
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Estimated resident bytes (values + keys + fixed overhead)
    pub fn estimated_bytes(&self) -> u64 {
        self.stats.resident_bytes()
    }

    /// Sweep every entry and reclaim the expired ones; returns their keys
    pub fn cleanup_expired(&mut self) -> Vec<String> {
        let now = self.clock.now_ms();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = self.entries.shift_remove(key) {
                self.stats.sub_resident_bytes(entry.estimated_bytes(key));
                self.stats.record_expiration();
            }
        }

        self.stats.record_cleanup();
        expired
    }

    /// Evict oldest entries until estimated resident bytes are back under
    /// the watermark. Returns the number of entries evicted.
    pub fn optimize_memory(&mut self) -> usize {
        let watermark = (self.memory_budget_bytes as f64 * self.memory_threshold) as u64;
        if self.stats.resident_bytes() <= watermark {
            return 0;
        }

        let mut evicted = 0;
        while self.stats.resident_bytes() > watermark && !self.entries.is_empty() {
            self.evict_oldest();
            evicted += 1;
        }

        self.stats.record_memory_optimization();
        debug!(evicted, watermark, "memory pressure eviction");
        evicted
    }

    /// Most-recent entries first, for migration between algorithm instances
    pub fn export_recent(&self, limit: usize) -> Vec<(String, CacheEntry)> {
        self.entries
            .iter()
            .rev()
            .take(limit)
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect()
    }

    /// Insert a pre-built entry (tier transfer or migration). Returns the
    /// evicted oldest entry when the insert overflowed the cache.
    pub fn insert_entry(&mut self, key: String, entry: CacheEntry) -> Option<(String, CacheEntry)> {
        let mut victim = None;
        if let Some(old) = self.entries.shift_remove(&key) {
            self.stats.sub_resident_bytes(old.estimated_bytes(&key));
        } else if self.entries.len() >= self.max_size {
            victim = self.pop_oldest();
            if victim.is_some() {
                self.stats.record_eviction();
            }
        }

        self.stats.add_resident_bytes(entry.estimated_bytes(&key));
        self.entries.insert(key, entry);
        victim
    }

    /// Remove and return an entry without touching the delete counter
    pub fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.shift_remove(key)?;
        self.stats.sub_resident_bytes(entry.estimated_bytes(key));
        Some(entry)
    }

    /// Pop the least-recently-used entry without counting an eviction
    pub fn pop_oldest(&mut self) -> Option<(String, CacheEntry)> {
        let (key, entry) = self.entries.shift_remove_index(0)?;
        self.stats.sub_resident_bytes(entry.estimated_bytes(&key));
        Some((key, entry))
    }

    fn evict_oldest(&mut self) {
        if self.pop_oldest().is_some() {
            self.stats.record_eviction();
        }
    }
}

impl std::fmt::Debug for LruCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.entries.len())
            .field("max_size", &self.max_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn cache_with_clock(max_size: usize, ttl_ms: u64) -> (LruCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = LruCache::new(max_size, ttl_ms, clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_access_resurrects_position() {
        let (mut cache, _clock) = cache_with_clock(3, 10_000);

        cache.set("k1", Bytes::from("v1"), None);
        cache.set("k2", Bytes::from("v2"), None);
        cache.set("k3", Bytes::from("v3"), None);

        // k1 becomes most recent; inserting k4 must evict k2
        assert_eq!(cache.get("k1"), Some(Bytes::from("v1")));
        cache.set("k4", Bytes::from("v4"), None);

        assert!(!cache.has("k2"));
        assert!(cache.has("k1"));
        assert!(cache.has("k4"));
    }

    #[test]
    fn test_lru_sequence_with_clock() {
        let (mut cache, clock) = cache_with_clock(3, 1000);

        cache.set("k1", Bytes::from("v1"), None);
        cache.set("k2", Bytes::from("v2"), None);
        cache.set("k3", Bytes::from("v3"), None);

        clock.set(10);
        assert_eq!(cache.get("k1"), Some(Bytes::from("v1")));

        clock.set(20);
        cache.set("k4", Bytes::from("v4"), None);

        clock.set(30);
        assert_eq!(cache.get("k2"), None);

        let stats = cache.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_ttl_expiry_counts_miss() {
        let (mut cache, clock) = cache_with_clock(10, 10_000);

        cache.set("k", Bytes::from("v"), Some(100));
        clock.set(99);
        assert_eq!(cache.get("k"), Some(Bytes::from("v")));

        clock.set(101);
        assert_eq!(cache.get("k"), None);

        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_delete_pattern() {
        let (mut cache, _clock) = cache_with_clock(10, 10_000);

        cache.set("a1", Bytes::from("x"), None);
        cache.set("a2", Bytes::from("x"), None);
        cache.set("b1", Bytes::from("x"), None);

        let removed = cache.delete_pattern("^a").unwrap();
        assert_eq!(removed, 2);
        assert!(!cache.has("a1"));
        assert!(!cache.has("a2"));
        assert!(cache.has("b1"));
    }

    #[test]
    fn test_delete_pattern_rejects_bad_regex() {
        let (mut cache, _clock) = cache_with_clock(10, 10_000);
        cache.set("a1", Bytes::from("x"), None);

        assert!(cache.delete_pattern("[bad").is_err());
        // no state mutated
        assert!(cache.has("a1"));
    }

    #[test]
    fn test_touch_extends_ttl() {
        let (mut cache, clock) = cache_with_clock(10, 1000);

        cache.set("k", Bytes::from("v"), Some(100));
        clock.set(90);
        assert!(cache.touch("k", Some(500)));

        clock.set(300);
        assert_eq!(cache.get("k"), Some(Bytes::from("v")));

        clock.set(591);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let (mut cache, _clock) = cache_with_clock(2, 10_000);

        cache.set("k1", Bytes::from("v1"), None);
        cache.set("k2", Bytes::from("v2"), None);
        // replacing k1 must not evict anyone
        cache.set("k1", Bytes::from("v1b"), None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("k1"), Some(Bytes::from("v1b")));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_cleanup_expired() {
        let (mut cache, clock) = cache_with_clock(10, 10_000);

        cache.set("short", Bytes::from("x"), Some(50));
        cache.set("long", Bytes::from("x"), Some(5000));

        clock.set(100);
        let removed = cache.cleanup_expired();
        assert_eq!(removed, vec!["short".to_string()]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().cleanups, 1);
    }

    #[test]
    fn test_optimize_memory_evicts_oldest() {
        let clock = Arc::new(ManualClock::new());
        let mut cache =
            LruCache::new(100, 10_000, clock).with_memory_budget(0.5, 1000);

        // each entry ~ 100 + key + 64 bytes
        for i in 0..8 {
            cache.set(&format!("key{}", i), Bytes::from(vec![0u8; 100]), None);
        }
        assert!(cache.estimated_bytes() > 500);

        let evicted = cache.optimize_memory();
        assert!(evicted > 0);
        assert!(cache.estimated_bytes() <= 500);
        assert_eq!(cache.stats().memory_optimizations, 1);
        // oldest keys went first
        assert!(!cache.has("key0"));
    }

    #[test]
    fn test_metadata_and_keys() {
        let (mut cache, clock) = cache_with_clock(10, 1000);

        cache.set("k", Bytes::from("value"), None);
        clock.set(5);
        cache.get("k");

        let meta = cache.metadata("k").unwrap();
        assert_eq!(meta.created_at, 0);
        assert_eq!(meta.last_accessed, 5);
        assert_eq!(meta.access_count, 1);
        assert_eq!(meta.expires_at, Some(1000));

        assert_eq!(cache.keys(), vec!["k".to_string()]);
        assert!(cache.metadata("absent").is_none());
    }

    #[test]
    fn test_shrink_evicts_oldest() {
        let (mut cache, _clock) = cache_with_clock(4, 10_000);
        for i in 0..4 {
            cache.set(&format!("k{}", i), Bytes::from("v"), None);
        }

        cache.set_max_size(2);
        assert_eq!(cache.len(), 2);
        assert!(cache.has("k2"));
        assert!(cache.has("k3"));
    }

    #[test]
    fn test_export_recent_order() {
        let (mut cache, _clock) = cache_with_clock(5, 10_000);
        cache.set("a", Bytes::from("1"), None);
        cache.set("b", Bytes::from("2"), None);
        cache.set("c", Bytes::from("3"), None);
        cache.get("a");

        let recent = cache.export_recent(2);
        assert_eq!(recent[0].0, "a");
        assert_eq!(recent[1].0, "c");
    }

    #[test]
    fn test_clear_resets_bytes() {
        let (mut cache, _clock) = cache_with_clock(5, 10_000);
        cache.set("a", Bytes::from("1"), None);
        cache.set("b", Bytes::from("2"), None);

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.estimated_bytes(), 0);
    }
}
