//! Cache statistics
//!
//! Atomic counters updated on the hot path, snapshotted on demand.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one cache instance
#[derive(Debug, Default)]
pub struct CacheStats {
    pub requests: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub sets: AtomicU64,
    pub deletes: AtomicU64,
    pub evictions: AtomicU64,
    pub expirations: AtomicU64,
    pub compressions: AtomicU64,
    pub decompressions: AtomicU64,
    pub cleanups: AtomicU64,
    pub memory_optimizations: AtomicU64,
    pub bytes_resident: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hit; also counts the request
    #[inline]
    pub fn record_hit(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a miss; also counts the request
    #[inline]
    pub fn record_miss(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_compression(&self) {
        self.compressions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_decompression(&self) {
        self.decompressions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_memory_optimization(&self) {
        self.memory_optimizations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_resident_bytes(&self, bytes: u64) {
        self.bytes_resident.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn sub_resident_bytes(&self, bytes: u64) {
        // saturating: replacement races may briefly over-subtract
        let _ = self
            .bytes_resident
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(bytes))
            });
    }

    #[inline]
    pub fn resident_bytes(&self) -> u64 {
        self.bytes_resident.load(Ordering::Relaxed)
    }

    /// Current hit rate in [0, 1]
    pub fn hit_rate(&self) -> f64 {
        let requests = self.requests.load(Ordering::Relaxed);
        if requests == 0 {
            0.0
        } else {
            self.hits.load(Ordering::Relaxed) as f64 / requests as f64
        }
    }

    /// Reset every counter to zero
    pub fn reset(&self) {
        for counter in [
            &self.requests,
            &self.hits,
            &self.misses,
            &self.sets,
            &self.deletes,
            &self.evictions,
            &self.expirations,
            &self.compressions,
            &self.decompressions,
            &self.cleanups,
            &self.memory_optimizations,
            &self.bytes_resident,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        StatsSnapshot {
            requests,
            hits,
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            compressions: self.compressions.load(Ordering::Relaxed),
            decompressions: self.decompressions.load(Ordering::Relaxed),
            cleanups: self.cleanups.load(Ordering::Relaxed),
            memory_optimizations: self.memory_optimizations.load(Ordering::Relaxed),
            bytes_resident: self.bytes_resident.load(Ordering::Relaxed),
            hit_rate: if requests == 0 {
                0.0
            } else {
                hits as f64 / requests as f64
            },
        }
    }
}

/// Serializable snapshot of [`CacheStats`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub compressions: u64,
    pub decompressions: u64,
    pub cleanups: u64,
    pub memory_optimizations: u64,
    pub bytes_resident: u64,
    pub hit_rate: f64,
}

impl StatsSnapshot {
    pub fn total_requests(&self) -> u64 {
        self.requests
    }

    /// Merge another snapshot into this one, recomputing the hit rate
    pub fn merge(&mut self, other: &StatsSnapshot) {
        self.requests += other.requests;
        self.hits += other.hits;
        self.misses += other.misses;
        self.sets += other.sets;
        self.deletes += other.deletes;
        self.evictions += other.evictions;
        self.expirations += other.expirations;
        self.compressions += other.compressions;
        self.decompressions += other.decompressions;
        self.cleanups += other.cleanups;
        self.memory_optimizations += other.memory_optimizations;
        self.bytes_resident += other.bytes_resident;
        self.hit_rate = if self.requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.requests as f64
        };
    }
}
