//! Multi-tier cache
//!
//! Three tiers driven by access temperature:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     Multi-Tier Cache                       │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────────────┐  │
//! │  │  L1 hot    │   │  L2 warm   │   │  L3 cold           │  │
//! │  │  (LRU map) │   │  (LRU map) │   │  (compressed)      │  │
//! │  └─────┬──────┘   └─────┬──────┘   └─────────┬──────────┘  │
//! │        └────────────────┼────────────────────┘             │
//! │                 ┌───────┴────────┐                         │
//! │                 │  Temperature   │                         │
//! │                 │  Tracker       │                         │
//! │                 └────────────────┘                         │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookups probe L1 -> L2 -> L3; hits heat the key and promote it when it
//! crosses the warm/hot thresholds. Overflowing a tier demotes that tier's
//! LRU entry downward with its remaining TTL capped at the lower tier's
//! default; overflowing L3 evicts outright.
//!
//! One mutex guards all tier state. Compression and decompression happen
//! outside that lock: the value (or its raw payload) is snapshotted under
//! the lock, the codec runs unlocked, and the result is installed on
//! re-acquire. A concurrent writer can win that race; last writer wins.

use crate::clock::ClockRef;
use crate::compressed::{Codec, CompressedStore};
use crate::compression::default_compressor;
use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::events::CacheEvent;
use crate::lru::LruCache;
use crate::stats::{CacheStats, StatsSnapshot};
use crate::temperature::{Temperature, TemperatureTracker};
use crate::tier::CacheTier;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Per-tier view for [`MultiTierStats`]
#[derive(Debug, Clone, Serialize)]
pub struct TierSnapshot {
    pub tier: CacheTier,
    pub entries: usize,
    pub bytes: u64,
    pub stats: StatsSnapshot,
}

impl TierSnapshot {
    pub fn hit_rate(&self) -> f64 {
        self.stats.hit_rate
    }
}

/// Detailed statistics across all tiers
#[derive(Debug, Clone, Serialize)]
pub struct MultiTierStats {
    pub overall: StatsSnapshot,
    pub l1: TierSnapshot,
    pub l2: TierSnapshot,
    pub l3: TierSnapshot,
    pub promotions: u64,
    pub demotions: u64,
    pub hot_threshold: u32,
}

struct TierState {
    l1: LruCache,
    l2: LruCache,
    l3: CompressedStore,
    temps: TemperatureTracker,
}

/// Hot/warm/cold cache with a compressed cold tier
pub struct MultiTierCache {
    state: Mutex<TierState>,
    codec: Codec,
    stats: CacheStats,
    promotions: AtomicU64,
    demotions: AtomicU64,
    event_tx: broadcast::Sender<CacheEvent>,
    l1_ttl_ms: u64,
    l2_ttl_ms: u64,
    l3_ttl_ms: u64,
    clock: ClockRef,
}

impl MultiTierCache {
    pub fn new(config: &CacheConfig, clock: ClockRef) -> Self {
        let compressor = config
            .compressor
            .clone()
            .unwrap_or_else(default_compressor);
        let threshold = if config.enable_compression {
            config.compression_threshold
        } else {
            usize::MAX
        };
        let codec = Codec::new(compressor, threshold);

        let temp_capacity =
            (config.l1_max_size + config.l2_max_size + config.l3_max_size) * 2;

        let state = TierState {
            l1: LruCache::new(config.l1_max_size, config.l1_ttl_ms, clock.clone()),
            l2: LruCache::new(config.l2_max_size, config.l2_ttl_ms, clock.clone()),
            l3: CompressedStore::new(
                config.l3_max_size,
                config.l3_ttl_ms,
                codec.clone(),
                clock.clone(),
            ),
            temps: TemperatureTracker::new(
                temp_capacity,
                config.temperature_window_ms,
                config.hot_threshold,
                config.warm_threshold,
                clock.clone(),
            ),
        };

        let (event_tx, _) = broadcast::channel(256);

        Self {
            state: Mutex::new(state),
            codec,
            stats: CacheStats::new(),
            promotions: AtomicU64::new(0),
            demotions: AtomicU64::new(0),
            event_tx,
            l1_ttl_ms: config.l1_ttl_ms,
            l2_ttl_ms: config.l2_ttl_ms,
            l3_ttl_ms: config.l3_ttl_ms,
            clock,
        }
    }

    /// Subscribe to cache events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: CacheEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Look up a key, probing L1 -> L2 -> L3
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut state = self.state.lock();

        if let Some(value) = state.l1.get(key) {
            state.temps.record_access(key);
            drop(state);
            self.stats.record_hit();
            self.emit(CacheEvent::hit(key, CacheTier::L1Hot, false));
            return Some(value);
        }

        if let Some(value) = state.l2.get(key) {
            let temperature = state.temps.record_access(key);
            let promoted = if temperature == Temperature::Hot {
                if let Some(entry) = state.l2.remove_entry(key) {
                    self.install_l1(&mut state, key.to_string(), entry);
                    true
                } else {
                    false
                }
            } else {
                false
            };
            drop(state);
            self.stats.record_hit();
            self.emit(CacheEvent::hit(key, CacheTier::L2Warm, promoted));
            return Some(value);
        }

        // L3: snapshot the raw payload, decode outside the lock
        let payload = state.l3.peek_raw(key);
        let Some(payload) = payload else {
            state.temps.record_access(key);
            drop(state);
            self.stats.record_miss();
            self.emit(CacheEvent::miss(key));
            return None;
        };
        drop(state);

        let decoded = self.codec.decode(&payload);

        let mut state = self.state.lock();
        match decoded {
            Ok((value, decompressed)) => {
                if decompressed {
                    self.stats.record_decompression();
                }
                let temperature = state.temps.record_access(key);
                let promoted = if temperature >= Temperature::Warm {
                    self.promote_from_l3(&mut state, key, &payload, &value, temperature)
                } else {
                    false
                };
                drop(state);
                self.stats.record_hit();
                self.emit(CacheEvent::hit(key, CacheTier::L3Cold, promoted));
                Some(value)
            }
            Err(_) => {
                // undecodable payload: treat as absent
                state.l3.delete(key);
                state.temps.record_access(key);
                drop(state);
                self.stats.record_miss();
                self.emit(CacheEvent::miss(key));
                None
            }
        }
    }

    /// Store a value, placed by the key's prior temperature (cold if unknown)
    pub fn set(&self, key: &str, value: Bytes, ttl_ms: Option<u64>) -> bool {
        let mut state = self.state.lock();
        let temperature = state.temps.classify(key);

        // a set replaces the key wherever it currently lives
        state.l1.remove_entry(key);
        state.l2.remove_entry(key);
        state.l3.take_for_promotion(key);

        let now = self.clock.now_ms();
        let compressed = match temperature {
            Temperature::Hot => {
                let ttl = ttl_ms.unwrap_or(self.l1_ttl_ms);
                let entry = CacheEntry::new(value, now, Some(ttl));
                self.install_l1(&mut state, key.to_string(), entry);
                false
            }
            Temperature::Warm => {
                let ttl = ttl_ms.unwrap_or(self.l2_ttl_ms);
                let entry = CacheEntry::new(value, now, Some(ttl));
                self.install_l2(&mut state, key.to_string(), entry);
                false
            }
            Temperature::Cold => {
                // encode outside the lock, install on re-acquire
                drop(state);
                let encoded = self.codec.encode(&value);
                let compressed = encoded.compressed;
                let expires = now.saturating_add(ttl_ms.unwrap_or(self.l3_ttl_ms));
                let mut state = self.state.lock();
                // a writer may have landed the key elsewhere while unlocked
                state.l1.remove_entry(key);
                state.l2.remove_entry(key);
                let evicted = state.l3.insert_encoded(key.to_string(), encoded, Some(expires));
                if let Some(victim) = evicted {
                    self.emit(CacheEvent::evict(&victim, CacheTier::L3Cold));
                }
                compressed
            }
        };

        self.stats.record_set();
        let tier = match temperature {
            Temperature::Hot => CacheTier::L1Hot,
            Temperature::Warm => CacheTier::L2Warm,
            Temperature::Cold => CacheTier::L3Cold,
        };
        self.emit(CacheEvent::put(key, tier, compressed));
        debug!(key, %tier, "stored entry");
        true
    }

    pub fn has(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        state.l1.has(key) || state.l2.has(key) || state.l3.has(key)
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        let mut deleted = state.l1.remove_entry(key).is_some();
        deleted |= state.l2.remove_entry(key).is_some();
        deleted |= state.l3.take_for_promotion(key).is_some();
        drop(state);

        if deleted {
            self.stats.record_delete();
            self.emit(CacheEvent::Delete {
                key: key.to_string(),
            });
        }
        deleted
    }

    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.l1.clear() + state.l2.clear() + state.l3.clear();
        state.temps.clear();
        drop(state);

        self.emit(CacheEvent::Cleared {
            entries_removed: removed,
        });
        removed
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.l1.len() + state.l2.len() + state.l3.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut keys = state.l1.keys();
        keys.extend(state.l2.keys());
        keys.extend(state.l3.keys());
        keys
    }

    /// Sweep expired entries in every tier
    pub fn cleanup_expired(&self) -> usize {
        let mut state = self.state.lock();
        let l1 = state.l1.cleanup_expired();
        let l2 = state.l2.cleanup_expired();
        let l3 = state.l3.cleanup_expired();
        drop(state);

        let removed = l1.len() + l2.len() + l3.len();
        for (keys, tier) in [
            (l1, CacheTier::L1Hot),
            (l2, CacheTier::L2Warm),
            (l3, CacheTier::L3Cold),
        ] {
            for key in keys {
                self.emit(CacheEvent::expired(&key, tier));
            }
        }

        self.stats.record_cleanup();
        removed
    }

    /// Overall stats envelope, folding in per-tier counters
    pub fn stats(&self) -> StatsSnapshot {
        let state = self.state.lock();
        let l1 = state.l1.stats();
        let l2 = state.l2.stats();
        let l3 = state.l3.stats();
        let bytes = state.l1.estimated_bytes()
            + state.l2.estimated_bytes()
            + state.l3.stored_bytes();
        drop(state);

        let mut snap = self.stats.snapshot();
        // entries leave the cache entirely only from the cold tier;
        // L1/L2 overflow cascades down as demotion
        snap.evictions += l3.evictions;
        snap.expirations += l1.expirations + l2.expirations + l3.expirations;
        snap.compressions += l3.compressions;
        snap.decompressions += l3.decompressions;
        snap.bytes_resident = bytes;
        snap.hit_rate = if snap.requests == 0 {
            0.0
        } else {
            snap.hits as f64 / snap.requests as f64
        };
        snap
    }

    /// Per-tier sizes, hit rates, and operation counts
    pub fn detailed_stats(&self) -> MultiTierStats {
        let state = self.state.lock();
        let l1 = TierSnapshot {
            tier: CacheTier::L1Hot,
            entries: state.l1.len(),
            bytes: state.l1.estimated_bytes(),
            stats: state.l1.stats(),
        };
        let l2 = TierSnapshot {
            tier: CacheTier::L2Warm,
            entries: state.l2.len(),
            bytes: state.l2.estimated_bytes(),
            stats: state.l2.stats(),
        };
        let l3 = TierSnapshot {
            tier: CacheTier::L3Cold,
            entries: state.l3.len(),
            bytes: state.l3.stored_bytes(),
            stats: state.l3.stats(),
        };
        let hot_threshold = state.temps.hot_threshold();
        drop(state);

        MultiTierStats {
            overall: self.stats(),
            l1,
            l2,
            l3,
            promotions: self.promotions.load(Ordering::Relaxed),
            demotions: self.demotions.load(Ordering::Relaxed),
            hot_threshold,
        }
    }

    pub fn hot_threshold(&self) -> u32 {
        self.state.lock().temps.hot_threshold()
    }

    /// Adjust the hot threshold (used by auto-tuning)
    pub fn set_hot_threshold(&self, threshold: u32) {
        self.state.lock().temps.set_hot_threshold(threshold);
    }

    /// The shared codec; its threshold is live-tunable
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Which tier currently holds a key (diagnostics and tests)
    pub fn tier_of(&self, key: &str) -> Option<CacheTier> {
        let mut state = self.state.lock();
        if state.l1.has(key) {
            Some(CacheTier::L1Hot)
        } else if state.l2.has(key) {
            Some(CacheTier::L2Warm)
        } else if state.l3.has(key) {
            Some(CacheTier::L3Cold)
        } else {
            None
        }
    }

    /// Install into L1, demoting the L1 victim to L2 on overflow
    fn install_l1(&self, state: &mut TierState, key: String, entry: CacheEntry) {
        let entry = self.cap_expiry(entry, self.l1_ttl_ms);
        if let Some((victim_key, victim)) = state.l1.insert_entry(key, entry) {
            self.demotions.fetch_add(1, Ordering::Relaxed);
            self.emit(CacheEvent::demote(
                &victim_key,
                CacheTier::L1Hot,
                CacheTier::L2Warm,
            ));
            self.install_l2(state, victim_key, victim);
        }
    }

    /// Install into L2, demoting the L2 victim to L3 on overflow
    fn install_l2(&self, state: &mut TierState, key: String, entry: CacheEntry) {
        let entry = self.cap_expiry(entry, self.l2_ttl_ms);
        if let Some((victim_key, victim)) = state.l2.insert_entry(key, entry) {
            self.demotions.fetch_add(1, Ordering::Relaxed);
            self.emit(CacheEvent::demote(
                &victim_key,
                CacheTier::L2Warm,
                CacheTier::L3Cold,
            ));
            self.install_l3(state, victim_key, victim);
        }
    }

    /// Encode and install into L3; overflow there evicts outright
    fn install_l3(&self, state: &mut TierState, key: String, entry: CacheEntry) {
        let now = self.clock.now_ms();
        let ttl = entry
            .remaining_ttl(now)
            .unwrap_or(self.l3_ttl_ms)
            .min(self.l3_ttl_ms);
        let encoded = self.codec.encode(&entry.value);
        let evicted = state
            .l3
            .insert_encoded(key, encoded, Some(now.saturating_add(ttl)));
        if let Some(victim) = evicted {
            self.emit(CacheEvent::evict(&victim, CacheTier::L3Cold));
        }
    }

    /// Promote an L3 hit to L2 (and on to L1 when hot). The payload is
    /// re-checked against what was decoded; a concurrent writer wins.
    fn promote_from_l3(
        &self,
        state: &mut TierState,
        key: &str,
        expected_payload: &[u8],
        value: &Bytes,
        temperature: Temperature,
    ) -> bool {
        let current = match state.l3.take_for_promotion(key) {
            Some((payload, expires)) => (payload, expires),
            None => return false,
        };
        if current.0 != expected_payload {
            // value changed while unlocked; reinstall and skip promotion
            let encoded = crate::compressed::Encoded {
                payload: current.0,
                compressed: false,
            };
            state.l3.insert_encoded(key.to_string(), encoded, current.1);
            return false;
        }

        let now = self.clock.now_ms();
        let remaining = current
            .1
            .map(|deadline| deadline.saturating_sub(now))
            .unwrap_or(self.l2_ttl_ms);
        let entry = CacheEntry::new(value.clone(), now, Some(remaining));

        self.promotions.fetch_add(1, Ordering::Relaxed);
        if temperature == Temperature::Hot {
            self.emit(CacheEvent::promote(key, CacheTier::L3Cold, CacheTier::L1Hot));
            self.install_l1(state, key.to_string(), entry);
        } else {
            self.emit(CacheEvent::promote(key, CacheTier::L3Cold, CacheTier::L2Warm));
            self.install_l2(state, key.to_string(), entry);
        }
        true
    }

    /// Cap an entry's remaining lifetime at a tier's default TTL
    fn cap_expiry(&self, mut entry: CacheEntry, tier_ttl_ms: u64) -> CacheEntry {
        let now = self.clock.now_ms();
        let remaining = entry.remaining_ttl(now).unwrap_or(tier_ttl_ms);
        entry.expires_at = Some(now.saturating_add(remaining.min(tier_ttl_ms)));
        entry
    }
}

impl std::fmt::Debug for MultiTierCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MultiTierCache")
            .field("l1", &state.l1.len())
            .field("l2", &state.l2.len())
            .field("l3", &state.l3.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn cache(hot_threshold: u32) -> (MultiTierCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig {
            l1_max_size: 2,
            l2_max_size: 3,
            l3_max_size: 10,
            hot_threshold,
            warm_threshold: 2,
            compression_threshold: 64,
            ..Default::default()
        };
        let cache = MultiTierCache::new(&config, clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_cold_insert_lands_in_l3() {
        let (cache, _clock) = cache(3);

        cache.set("x", Bytes::from("1"), None);
        assert_eq!(cache.tier_of("x"), Some(CacheTier::L3Cold));
        assert_eq!(cache.get("x"), Some(Bytes::from("1")));
    }

    #[test]
    fn test_promotion_by_temperature() {
        let (cache, clock) = cache(3);

        cache.set("x", Bytes::from("1"), None);

        // first read: count=1, still cold, stays in L3
        clock.set(1);
        assert_eq!(cache.get("x"), Some(Bytes::from("1")));
        assert_eq!(cache.tier_of("x"), Some(CacheTier::L3Cold));

        // second read: warm, promoted to L2
        clock.set(2);
        assert_eq!(cache.get("x"), Some(Bytes::from("1")));
        assert_eq!(cache.tier_of("x"), Some(CacheTier::L2Warm));

        // third read: hot, promoted to L1
        clock.set(3);
        assert_eq!(cache.get("x"), Some(Bytes::from("1")));
        assert_eq!(cache.tier_of("x"), Some(CacheTier::L1Hot));

        // a new cold key does not disturb it
        clock.set(10);
        cache.set("y", Bytes::from("2"), None);
        assert_eq!(cache.tier_of("y"), Some(CacheTier::L3Cold));

        clock.set(20);
        assert_eq!(cache.get("x"), Some(Bytes::from("1")));
        assert_eq!(cache.tier_of("x"), Some(CacheTier::L1Hot));

        let stats = cache.detailed_stats();
        assert!(stats.promotions >= 2);
    }

    #[test]
    fn test_warm_key_not_evicted_by_cold_inserts() {
        let (cache, clock) = cache(5);

        cache.set("kept", Bytes::from("v"), None);
        clock.set(1);
        cache.get("kept");
        clock.set(2);
        cache.get("kept"); // warm now, lives in L2

        assert_eq!(cache.tier_of("kept"), Some(CacheTier::L2Warm));

        // cold inserts land in L3 and cannot push it out of L2
        for i in 0..8 {
            clock.advance(1);
            cache.set(&format!("cold{}", i), Bytes::from("v"), None);
        }
        assert_eq!(cache.tier_of("kept"), Some(CacheTier::L2Warm));
    }

    #[test]
    fn test_hot_set_goes_straight_to_l1() {
        let (cache, clock) = cache(2);

        cache.set("x", Bytes::from("1"), None);
        clock.set(1);
        cache.get("x");
        clock.set(2);
        cache.get("x"); // count=2 -> hot (threshold 2)

        clock.set(3);
        cache.set("x", Bytes::from("2"), None);
        assert_eq!(cache.tier_of("x"), Some(CacheTier::L1Hot));
        assert_eq!(cache.get("x"), Some(Bytes::from("2")));
    }

    #[test]
    fn test_l1_overflow_demotes_to_l2() {
        let (cache, clock) = cache(2);

        // make three keys hot with an L1 capacity of two
        for key in ["a", "b", "c"] {
            cache.set(key, Bytes::from("v"), None);
            clock.advance(1);
            cache.get(key);
            clock.advance(1);
            cache.get(key);
            clock.advance(1);
            cache.set(key, Bytes::from("v2"), None);
        }

        let stats = cache.detailed_stats();
        assert_eq!(stats.l1.entries, 2);
        assert!(stats.demotions >= 1);
        // the first hot key was demoted down to L2
        assert_eq!(cache.tier_of("a"), Some(CacheTier::L2Warm));
    }

    #[test]
    fn test_compression_roundtrip_through_l3() {
        let (cache, _clock) = cache(3);

        let body: Vec<u8> = b"prompt body ".iter().cycle().take(4096).copied().collect();
        cache.set("big", Bytes::from(body.clone()), None);
        assert_eq!(cache.tier_of("big"), Some(CacheTier::L3Cold));

        let read = cache.get("big").unwrap();
        assert_eq!(read.as_ref(), &body[..]);

        let stats = cache.stats();
        assert_eq!(stats.compressions, 1);
        assert_eq!(stats.decompressions, 1);
    }

    #[test]
    fn test_miss_still_updates_temperature() {
        let (cache, clock) = cache(3);

        // two misses heat the key to warm before it ever exists
        cache.get("future");
        clock.set(1);
        cache.get("future");

        cache.set("future", Bytes::from("v"), None);
        assert_eq!(cache.tier_of("future"), Some(CacheTier::L2Warm));
    }

    #[test]
    fn test_per_tier_ttl_defaults() {
        let (cache, clock) = cache(3);

        cache.set("x", Bytes::from("v"), Some(100));
        clock.set(101);
        assert_eq!(cache.get("x"), None);
        assert!(cache.stats().expirations >= 1);
    }

    #[test]
    fn test_delete_and_clear() {
        let (cache, _clock) = cache(3);

        cache.set("a", Bytes::from("1"), None);
        cache.set("b", Bytes::from("2"), None);

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_events_emitted() {
        let (cache, _clock) = cache(3);
        let mut events = cache.subscribe();

        cache.set("k", Bytes::from("v"), None);
        cache.get("k");

        match events.try_recv().unwrap() {
            CacheEvent::Put { key, tier, .. } => {
                assert_eq!(key, "k");
                assert_eq!(tier, CacheTier::L3Cold);
            }
            other => panic!("expected Put, got {:?}", other),
        }
        match events.try_recv().unwrap() {
            CacheEvent::Hit { key, tier, .. } => {
                assert_eq!(key, "k");
                assert_eq!(tier, CacheTier::L3Cold);
            }
            other => panic!("expected Hit, got {:?}", other),
        }
    }

    #[test]
    fn test_evict_and_expired_events() {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig {
            l1_max_size: 2,
            l2_max_size: 2,
            l3_max_size: 2,
            hot_threshold: 5,
            warm_threshold: 2,
            ..Default::default()
        };
        let cache = MultiTierCache::new(&config, clock.clone());
        let mut events = cache.subscribe();

        // cold inserts; the third overflows L3 and evicts the oldest
        cache.set("a", Bytes::from("1"), None);
        cache.set("b", Bytes::from("2"), None);
        cache.set("c", Bytes::from("3"), None);

        // a short-lived entry swept by cleanup
        cache.set("d", Bytes::from("4"), Some(50));
        clock.set(100);
        assert_eq!(cache.cleanup_expired(), 1);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }

        assert!(seen.iter().any(|e| matches!(
            e,
            CacheEvent::Evict { key, tier: CacheTier::L3Cold } if key == "a"
        )));
        assert!(seen.iter().any(|e| matches!(
            e,
            CacheEvent::Expired { key, tier: CacheTier::L3Cold } if key == "d"
        )));
    }

    #[test]
    fn test_detailed_stats_shape() {
        let (cache, _clock) = cache(3);

        cache.set("k", Bytes::from("v"), None);
        cache.get("k");
        cache.get("missing");

        let stats = cache.detailed_stats();
        assert_eq!(stats.l3.entries, 1);
        assert_eq!(stats.overall.hits, 1);
        assert_eq!(stats.overall.misses, 1);
        assert!((stats.overall.hit_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.hot_threshold, 3);
    }
}
