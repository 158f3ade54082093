//! LFU cache
//!
//! Eviction picks the smallest frequency, breaking ties by the oldest
//! last-access time. Frequencies live in a parallel map and only climb on
//! reads; a `set` never counts as use. The eviction scan is O(n), which is
//! fine at the entry counts this engine runs at.

use crate::clock::ClockRef;
use crate::entry::CacheEntry;
use crate::stats::{CacheStats, StatsSnapshot};
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Frequency-evicting cache with TTL
pub struct LfuCache {
    entries: IndexMap<String, CacheEntry>,
    /// Read counts, kept beside the entries so eviction can scan them cheaply
    frequencies: HashMap<String, u64>,
    max_size: usize,
    default_ttl_ms: u64,
    clock: ClockRef,
    stats: CacheStats,
}

impl LfuCache {
    pub fn new(max_size: usize, default_ttl_ms: u64, clock: ClockRef) -> Self {
        Self {
            entries: IndexMap::new(),
            frequencies: HashMap::new(),
            max_size: max_size.max(1),
            default_ttl_ms,
            clock,
            stats: CacheStats::new(),
        }
    }

    /// Look up a key; a live hit bumps its frequency
    pub fn get(&mut self, key: &str) -> Option<Bytes> {
        let now = self.clock.now_ms();

        let live_value = match self.entries.get_mut(key) {
            Some(entry) if entry.is_expired(now) => None,
            Some(entry) => {
                entry.record_access(now);
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        match live_value {
            Some(value) => {
                *self.frequencies.entry(key.to_string()).or_insert(0) += 1;
                self.stats.record_hit();
                Some(value)
            }
            None => {
                self.drop_entry(key);
                self.stats.record_expiration();
                self.stats.record_miss();
                None
            }
        }
    }

    /// Store a value. Does not bump the frequency counter.
    pub fn set(&mut self, key: &str, value: Bytes, ttl_ms: Option<u64>) -> bool {
        let now = self.clock.now_ms();
        let ttl = ttl_ms.unwrap_or(self.default_ttl_ms);

        if let Some(old) = self.entries.swap_remove(key) {
            self.stats.sub_resident_bytes(old.estimated_bytes(key));
        } else if self.entries.len() >= self.max_size {
            self.evict_least_frequent();
        }

        let entry = CacheEntry::new(value, now, Some(ttl));
        self.stats.add_resident_bytes(entry.estimated_bytes(key));
        self.entries.insert(key.to_string(), entry);
        self.frequencies.entry(key.to_string()).or_insert(0);
        self.stats.record_set();
        true
    }

    pub fn has(&mut self, key: &str) -> bool {
        let now = self.clock.now_ms();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return false,
        };

        if expired {
            self.drop_entry(key);
            self.stats.record_expiration();
            self.stats.record_miss();
            return false;
        }
        true
    }

    pub fn delete(&mut self, key: &str) -> bool {
        if self.drop_entry(key) {
            self.stats.record_delete();
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.frequencies.clear();
        self.stats
            .bytes_resident
            .store(0, std::sync::atomic::Ordering::Relaxed);
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Current read count for a key (0 if never read or absent)
    pub fn frequency(&self, key: &str) -> u64 {
        self.frequencies.get(key).copied().unwrap_or(0)
    }

    /// Sweep expired entries; returns the reclaimed keys
    pub fn cleanup_expired(&mut self) -> Vec<String> {
        let now = self.clock.now_ms();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            self.drop_entry(key);
            self.stats.record_expiration();
        }

        self.stats.record_cleanup();
        expired
    }

    /// Most-recently-accessed entries first, for migration
    pub fn export_recent(&self, limit: usize) -> Vec<(String, CacheEntry)> {
        let mut all: Vec<(String, CacheEntry)> = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();
        all.sort_by(|a, b| b.1.last_accessed.cmp(&a.1.last_accessed));
        all.truncate(limit);
        all
    }

    /// Insert a pre-built entry (migration), evicting if needed
    pub fn insert_entry(&mut self, key: String, entry: CacheEntry) {
        if let Some(old) = self.entries.swap_remove(&key) {
            self.stats.sub_resident_bytes(old.estimated_bytes(&key));
        } else if self.entries.len() >= self.max_size {
            self.evict_least_frequent();
        }
        self.stats.add_resident_bytes(entry.estimated_bytes(&key));
        self.entries.insert(key.clone(), entry);
        self.frequencies.entry(key).or_insert(0);
    }

    /// Evict the entry with the smallest frequency, oldest last access on ties
    fn evict_least_frequent(&mut self) {
        let victim = self
            .entries
            .iter()
            .map(|(key, entry)| {
                let freq = self.frequencies.get(key).copied().unwrap_or(0);
                (key.clone(), freq, entry.last_accessed)
            })
            .min_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)))
            .map(|(key, _, _)| key);

        if let Some(key) = victim {
            self.drop_entry(&key);
            self.stats.record_eviction();
        }
    }

    fn drop_entry(&mut self, key: &str) -> bool {
        self.frequencies.remove(key);
        match self.entries.swap_remove(key) {
            Some(entry) => {
                self.stats.sub_resident_bytes(entry.estimated_bytes(key));
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for LfuCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LfuCache")
            .field("len", &self.entries.len())
            .field("max_size", &self.max_size)
            .finish()
    }
}
