//! Adaptive replacement cache
//!
//! Four ordered collections: T1/T2 hold resident entries (recent and
//! frequent), B1/B2 are ghost lists remembering recently evicted keys without
//! their values. A hit in a ghost list is the adaptation signal: it moves the
//! target size `p` toward the list that was hit, so the cache drifts between
//! recency-favoring and frequency-favoring behavior on its own.
//!
//! Invariants maintained after every operation:
//! `|T1| + |B1| <= c`, `|T1| + |T2| + |B1| + |B2| <= 2c`, `0 <= p <= c`.

use crate::clock::ClockRef;
use crate::entry::CacheEntry;
use crate::stats::{CacheStats, StatsSnapshot};
use bytes::Bytes;
use indexmap::IndexMap;

/// Adaptive replacement cache with TTL on resident entries
pub struct ArcCache {
    /// Recent residents (front = LRU)
    t1: IndexMap<String, CacheEntry>,
    /// Frequent residents (front = LRU)
    t2: IndexMap<String, CacheEntry>,
    /// Ghosts of T1 evictions: key -> eviction time
    b1: IndexMap<String, u64>,
    /// Ghosts of T2 evictions
    b2: IndexMap<String, u64>,
    /// Target size for T1
    p: usize,
    capacity: usize,
    default_ttl_ms: u64,
    clock: ClockRef,
    stats: CacheStats,
}

impl ArcCache {
    pub fn new(capacity: usize, default_ttl_ms: u64, clock: ClockRef) -> Self {
        Self {
            t1: IndexMap::new(),
            t2: IndexMap::new(),
            b1: IndexMap::new(),
            b2: IndexMap::new(),
            p: 0,
            capacity: capacity.max(1),
            default_ttl_ms,
            clock,
            stats: CacheStats::new(),
        }
    }

    /// Look up a key. A T1 hit graduates the entry to T2; a T2 hit refreshes
    /// its position within T2.
    pub fn get(&mut self, key: &str) -> Option<Bytes> {
        let now = self.clock.now_ms();

        if let Some(mut entry) = self.t1.shift_remove(key) {
            if entry.is_expired(now) {
                self.stats.sub_resident_bytes(entry.estimated_bytes(key));
                self.stats.record_expiration();
                self.stats.record_miss();
                return None;
            }
            entry.record_access(now);
            let value = entry.value.clone();
            self.t2.insert(key.to_string(), entry);
            self.stats.record_hit();
            return Some(value);
        }

        if let Some(mut entry) = self.t2.shift_remove(key) {
            if entry.is_expired(now) {
                self.stats.sub_resident_bytes(entry.estimated_bytes(key));
                self.stats.record_expiration();
                self.stats.record_miss();
                return None;
            }
            entry.record_access(now);
            let value = entry.value.clone();
            self.t2.insert(key.to_string(), entry);
            self.stats.record_hit();
            return Some(value);
        }

        self.stats.record_miss();
        None
    }

    /// Store a value, adapting `p` on ghost hits
    pub fn set(&mut self, key: &str, value: Bytes, ttl_ms: Option<u64>) -> bool {
        let now = self.clock.now_ms();
        let ttl = ttl_ms.unwrap_or(self.default_ttl_ms);
        let entry = CacheEntry::new(value, now, Some(ttl));
        self.insert_entry(key.to_string(), entry);
        self.stats.record_set();
        true
    }

    /// Insert a pre-built entry (also used for migration between algorithms)
    pub fn insert_entry(&mut self, key: String, entry: CacheEntry) {
        let now = self.clock.now_ms();
        let bytes = entry.estimated_bytes(&key);

        // Resident hit: update value in place at the MRU end of its list
        if let Some(old) = self.t1.shift_remove(&key) {
            self.stats.sub_resident_bytes(old.estimated_bytes(&key));
            self.stats.add_resident_bytes(bytes);
            self.t1.insert(key, entry);
            return;
        }
        if let Some(old) = self.t2.shift_remove(&key) {
            self.stats.sub_resident_bytes(old.estimated_bytes(&key));
            self.stats.add_resident_bytes(bytes);
            self.t2.insert(key, entry);
            return;
        }

        // Ghost hit in B1: recency was undervalued, grow p
        if self.b1.contains_key(&key) {
            let delta = (self.b2.len() / self.b1.len().max(1)).max(1);
            self.p = (self.p + delta).min(self.capacity);
            self.replace(false, now);
            self.b1.shift_remove(&key);
            self.stats.add_resident_bytes(bytes);
            self.t2.insert(key, entry);
            return;
        }

        // Ghost hit in B2: frequency was undervalued, shrink p
        if self.b2.contains_key(&key) {
            let delta = (self.b1.len() / self.b2.len().max(1)).max(1);
            self.p = self.p.saturating_sub(delta);
            self.replace(true, now);
            self.b2.shift_remove(&key);
            self.stats.add_resident_bytes(bytes);
            self.t2.insert(key, entry);
            return;
        }

        // Brand-new key
        self.make_room(now);
        self.stats.add_resident_bytes(bytes);
        self.t1.insert(key, entry);
    }

    /// Maintain the size invariants ahead of a T1 insert
    fn make_room(&mut self, now: u64) {
        let l1 = self.t1.len() + self.b1.len();
        if l1 >= self.capacity {
            if self.t1.len() < self.capacity {
                self.b1.shift_remove_index(0);
                self.replace(false, now);
            } else {
                // B1 empty and T1 at capacity: drop the T1 LRU entirely
                if let Some((victim, old)) = self.t1.shift_remove_index(0) {
                    self.stats.sub_resident_bytes(old.estimated_bytes(&victim));
                    self.stats.record_eviction();
                }
            }
        } else {
            let total = self.t1.len() + self.t2.len() + self.b1.len() + self.b2.len();
            if total >= self.capacity {
                if total >= 2 * self.capacity {
                    self.b2.shift_remove_index(0);
                }
                self.replace(false, now);
            }
        }
    }

    /// Demote one resident to its ghost list, steered by `p`
    fn replace(&mut self, requested_in_b2: bool, now: u64) {
        let t1_len = self.t1.len();
        let prefer_t1 = t1_len > 0
            && (t1_len >= self.p.max(1) || (requested_in_b2 && t1_len == self.p));

        if prefer_t1 {
            if let Some((key, old)) = self.t1.shift_remove_index(0) {
                self.stats.sub_resident_bytes(old.estimated_bytes(&key));
                self.stats.record_eviction();
                self.b1.insert(key, now);
            }
        } else if let Some((key, old)) = self.t2.shift_remove_index(0) {
            self.stats.sub_resident_bytes(old.estimated_bytes(&key));
            self.stats.record_eviction();
            self.b2.insert(key, now);
        }
    }

    pub fn has(&mut self, key: &str) -> bool {
        let now = self.clock.now_ms();

        let expired_in_t1 = self.t1.get(key).map(|entry| entry.is_expired(now));
        if let Some(expired) = expired_in_t1 {
            if expired {
                if let Some(entry) = self.t1.shift_remove(key) {
                    self.stats.sub_resident_bytes(entry.estimated_bytes(key));
                }
                self.stats.record_expiration();
                self.stats.record_miss();
                return false;
            }
            return true;
        }

        let expired_in_t2 = self.t2.get(key).map(|entry| entry.is_expired(now));
        if let Some(expired) = expired_in_t2 {
            if expired {
                if let Some(entry) = self.t2.shift_remove(key) {
                    self.stats.sub_resident_bytes(entry.estimated_bytes(key));
                }
                self.stats.record_expiration();
                self.stats.record_miss();
                return false;
            }
            return true;
        }

        false
    }

    /// Delete a resident entry. Ghost records for the key are dropped too.
    pub fn delete(&mut self, key: &str) -> bool {
        self.b1.shift_remove(key);
        self.b2.shift_remove(key);

        let removed = self
            .t1
            .shift_remove(key)
            .or_else(|| self.t2.shift_remove(key));

        match removed {
            Some(entry) => {
                self.stats.sub_resident_bytes(entry.estimated_bytes(key));
                self.stats.record_delete();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) -> usize {
        let count = self.t1.len() + self.t2.len();
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.p = 0;
        self.stats
            .bytes_resident
            .store(0, std::sync::atomic::Ordering::Relaxed);
        count
    }

    /// Resident entry count
    pub fn len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t1.is_empty() && self.t2.is_empty()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Resident keys, T1 then T2
    pub fn keys(&self) -> Vec<String> {
        self.t1.keys().chain(self.t2.keys()).cloned().collect()
    }

    /// Sweep expired residents; returns the reclaimed keys
    pub fn cleanup_expired(&mut self) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut removed = Vec::new();

        for list in [&mut self.t1, &mut self.t2] {
            let expired: Vec<String> = list
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in expired {
                if let Some(entry) = list.shift_remove(&key) {
                    self.stats.sub_resident_bytes(entry.estimated_bytes(&key));
                    self.stats.record_expiration();
                    removed.push(key);
                }
            }
        }

        self.stats.record_cleanup();
        removed
    }

    /// Most valuable entries first (T2 MRU end, then T1 MRU end)
    pub fn export_recent(&self, limit: usize) -> Vec<(String, CacheEntry)> {
        self.t2
            .iter()
            .rev()
            .chain(self.t1.iter().rev())
            .take(limit)
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect()
    }

    // Introspection used by invariant tests and tuning
    pub fn t1_len(&self) -> usize {
        self.t1.len()
    }

    pub fn t2_len(&self) -> usize {
        self.t2.len()
    }

    pub fn b1_len(&self) -> usize {
        self.b1.len()
    }

    pub fn b2_len(&self) -> usize {
        self.b2.len()
    }

    pub fn p(&self) -> usize {
        self.p
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    fn assert_invariants(&self) {
        assert!(self.t1.len() + self.b1.len() <= self.capacity);
        assert!(
            self.t1.len() + self.t2.len() + self.b1.len() + self.b2.len() <= 2 * self.capacity
        );
        assert!(self.p <= self.capacity);
    }
}

impl std::fmt::Debug for ArcCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcCache")
            .field("t1", &self.t1.len())
            .field("t2", &self.t2.len())
            .field("b1", &self.b1.len())
            .field("b2", &self.b2.len())
            .field("p", &self.p)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn cache(capacity: usize) -> (ArcCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (ArcCache::new(capacity, 60_000, clock.clone()), clock)
    }

    #[test]
    fn test_t1_hit_graduates_to_t2() {
        let (mut cache, _clock) = cache(4);

        cache.set("k", Bytes::from("v"), None);
        assert_eq!(cache.t1_len(), 1);
        assert_eq!(cache.t2_len(), 0);

        assert_eq!(cache.get("k"), Some(Bytes::from("v")));
        assert_eq!(cache.t1_len(), 0);
        assert_eq!(cache.t2_len(), 1);
    }

    #[test]
    fn test_ghost_hit_reinstates_and_adapts() {
        let (mut cache, _clock) = cache(4);

        for i in 1..=4 {
            cache.set(&format!("k{}", i), Bytes::from("v"), None);
        }
        cache.get("k1");
        cache.get("k2");
        assert_eq!(cache.t1_len(), 2);
        assert_eq!(cache.t2_len(), 2);

        // new key forces a T1 demotion into B1 (p starts at 0)
        cache.set("k5", Bytes::from("v"), None);
        assert_eq!(cache.b1_len(), 1);
        assert!(cache.b1.contains_key("k3"));
        cache.assert_invariants();

        // re-inserting the ghost grows p and lands the key in T2
        let p_before = cache.p();
        cache.set("k3", Bytes::from("v"), None);
        assert!(cache.p() > p_before);
        assert!(cache.t2.contains_key("k3"));
        cache.assert_invariants();
    }

    #[test]
    fn test_invariants_under_churn() {
        let (mut cache, clock) = cache(8);

        for round in 0u64..50 {
            clock.advance(1);
            let key = format!("k{}", round % 13);
            cache.set(&key, Bytes::from("v"), None);
            if round % 3 == 0 {
                cache.get(&format!("k{}", (round / 2) % 13));
            }
            cache.assert_invariants();
        }
    }

    #[test]
    fn test_b2_hit_shrinks_p() {
        let (mut cache, _clock) = cache(3);

        // build up T2 and force a T2 demotion into B2
        for i in 0..3 {
            let key = format!("k{}", i);
            cache.set(&key, Bytes::from("v"), None);
            cache.get(&key);
        }
        assert_eq!(cache.t2_len(), 3);

        // grow p first so there is something to shrink
        cache.set("x1", Bytes::from("v"), None);
        cache.set("x2", Bytes::from("v"), None);
        cache.assert_invariants();

        if cache.b2_len() > 0 {
            let ghost: String = cache.b2.keys().next().unwrap().clone();
            let p_before = cache.p();
            cache.set(&ghost, Bytes::from("v"), None);
            assert!(cache.p() <= p_before);
            cache.assert_invariants();
        }
    }

    #[test]
    fn test_ttl_applies_to_residents_only() {
        let (mut cache, clock) = cache(4);

        cache.set("k", Bytes::from("v"), Some(100));
        clock.set(150);
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_delete_clears_ghosts() {
        let (mut cache, _clock) = cache(2);

        cache.set("a", Bytes::from("v"), None);
        cache.set("b", Bytes::from("v"), None);
        cache.get("a"); // a graduates to T2, b stays in T1
        cache.set("c", Bytes::from("v"), None); // demotes b into B1

        assert_eq!(cache.b1_len(), 1);

        // deleting a ghost-only key reports false but clears the ghost
        assert!(!cache.delete("b"));
        assert_eq!(cache.b1_len(), 0);

        // deleting a resident works exactly once
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        cache.assert_invariants();
    }

    #[test]
    fn test_full_t1_with_empty_b1_discards_lru() {
        let (mut cache, _clock) = cache(2);

        cache.set("a", Bytes::from("v"), None);
        cache.set("b", Bytes::from("v"), None);
        cache.set("c", Bytes::from("v"), None);

        // T1 was at capacity with no ghosts, so the LRU was dropped outright
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.b1_len() + cache.b2_len(), 0);
        assert!(!cache.has("a"));
        cache.assert_invariants();
    }

    #[test]
    fn test_update_in_place_keeps_lists() {
        let (mut cache, _clock) = cache(4);

        cache.set("k", Bytes::from("v1"), None);
        cache.get("k"); // now in T2
        cache.set("k", Bytes::from("v2"), None);

        assert_eq!(cache.t2_len(), 1);
        assert_eq!(cache.t1_len(), 0);
        assert_eq!(cache.get("k"), Some(Bytes::from("v2")));
    }

    #[test]
    fn test_export_recent_prefers_frequent() {
        let (mut cache, _clock) = cache(4);

        cache.set("recent", Bytes::from("v"), None);
        cache.set("frequent", Bytes::from("v"), None);
        cache.get("frequent");

        let exported = cache.export_recent(1);
        assert_eq!(exported[0].0, "frequent");
    }
}
