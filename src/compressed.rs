//! Cold-tier compressed byte store
//!
//! Stores opaque payloads with a one-byte format tag. Payloads under the
//! compression threshold are stored raw; everything else goes through the
//! injected [`Compressor`](crate::compression::Compressor). The store keeps
//! its own expiry map beside the byte map, and evicts its oldest entry when
//! it overflows.
//!
//! The [`Codec`] half is deliberately separable from the map so callers can
//! encode and decode outside whatever lock guards the store.

use crate::clock::ClockRef;
use crate::compression::CompressorRef;
use crate::entry::ENTRY_OVERHEAD_BYTES;
use crate::error::{Error, Result};
use crate::stats::{CacheStats, StatsSnapshot};
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Format tag for payloads stored as-is
pub const FORMAT_RAW: u8 = 0;
/// Format tag for payloads that went through the compressor
pub const FORMAT_COMPRESSED: u8 = 1;

// =============================================================================
// Codec
// =============================================================================

/// An encoded payload ready for storage
#[derive(Debug, Clone)]
pub struct Encoded {
    /// Tagged bytes (format byte + body)
    pub payload: Vec<u8>,
    pub compressed: bool,
}

impl Encoded {
    /// Stored size in bytes, tag included
    pub fn stored_len(&self) -> usize {
        self.payload.len()
    }
}

/// Compression policy shared between the store and its callers.
///
/// Cloning shares the threshold, so tuning adjustments apply everywhere.
#[derive(Clone)]
pub struct Codec {
    compressor: CompressorRef,
    threshold: Arc<AtomicUsize>,
}

impl Codec {
    pub fn new(compressor: CompressorRef, threshold: usize) -> Self {
        Self {
            compressor,
            threshold: Arc::new(AtomicUsize::new(threshold)),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold.load(Ordering::Relaxed)
    }

    pub fn set_threshold(&self, threshold: usize) {
        self.threshold.store(threshold, Ordering::Relaxed);
    }

    /// Encode a payload. Falls back to raw storage when the payload is below
    /// the threshold, when compression fails, or when it would not shrink.
    pub fn encode(&self, data: &[u8]) -> Encoded {
        if data.len() >= self.threshold() {
            match self.compressor.compress(data) {
                Ok(compressed) if compressed.len() < data.len() => {
                    let mut payload = Vec::with_capacity(compressed.len() + 1);
                    payload.push(FORMAT_COMPRESSED);
                    payload.extend_from_slice(&compressed);
                    return Encoded {
                        payload,
                        compressed: true,
                    };
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "compression failed, storing raw");
                }
            }
        }

        let mut payload = Vec::with_capacity(data.len() + 1);
        payload.push(FORMAT_RAW);
        payload.extend_from_slice(data);
        Encoded {
            payload,
            compressed: false,
        }
    }

    /// Decode a tagged payload. Returns the bytes and whether a
    /// decompression happened.
    pub fn decode(&self, payload: &[u8]) -> Result<(Bytes, bool)> {
        match payload.split_first() {
            Some((&FORMAT_RAW, body)) => Ok((Bytes::copy_from_slice(body), false)),
            Some((&FORMAT_COMPRESSED, body)) => {
                let decompressed = self.compressor.decompress(body)?;
                Ok((Bytes::from(decompressed), true))
            }
            Some((tag, _)) => Err(Error::CompressionFailure(format!(
                "unknown format tag {}",
                tag
            ))),
            None => Err(Error::CompressionFailure("empty payload".into())),
        }
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("threshold", &self.threshold())
            .finish()
    }
}

// =============================================================================
// Compressed Store
// =============================================================================

/// Byte store with on-write compression and on-read decompression
pub struct CompressedStore {
    /// Tagged payloads in recency order (front = oldest)
    payloads: IndexMap<String, Vec<u8>>,
    /// Expiry times, kept beside the byte map
    ttls: HashMap<String, u64>,
    max_size: usize,
    default_ttl_ms: u64,
    codec: Codec,
    clock: ClockRef,
    stats: CacheStats,
}

impl CompressedStore {
    pub fn new(max_size: usize, default_ttl_ms: u64, codec: Codec, clock: ClockRef) -> Self {
        Self {
            payloads: IndexMap::new(),
            ttls: HashMap::new(),
            max_size: max_size.max(1),
            default_ttl_ms,
            codec,
            clock,
            stats: CacheStats::new(),
        }
    }

    /// The store's codec; clones share the compression threshold
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Store a payload, compressing it when it clears the threshold.
    /// Returns the stored length in bytes.
    pub fn put(&mut self, key: &str, data: &[u8], ttl_ms: Option<u64>) -> usize {
        let now = self.clock.now_ms();
        let expires_at = now.saturating_add(ttl_ms.unwrap_or(self.default_ttl_ms));
        let encoded = self.codec.encode(data);
        let stored = encoded.stored_len();
        self.insert_encoded(key.to_string(), encoded, Some(expires_at));
        stored
    }

    /// Install a pre-encoded payload with an absolute expiry. Returns the
    /// key evicted to make room, when the store was full.
    pub fn insert_encoded(
        &mut self,
        key: String,
        encoded: Encoded,
        expires_at: Option<u64>,
    ) -> Option<String> {
        let mut evicted = None;
        if let Some(old) = self.payloads.shift_remove(&key) {
            self.stats
                .sub_resident_bytes(Self::footprint(&key, &old));
        } else if self.payloads.len() >= self.max_size {
            if let Some((victim, old)) = self.payloads.shift_remove_index(0) {
                self.stats
                    .sub_resident_bytes(Self::footprint(&victim, &old));
                self.ttls.remove(&victim);
                self.stats.record_eviction();
                evicted = Some(victim);
            }
        }

        if encoded.compressed {
            self.stats.record_compression();
        }

        self.stats
            .add_resident_bytes(Self::footprint(&key, &encoded.payload));
        match expires_at {
            Some(deadline) => {
                self.ttls.insert(key.clone(), deadline);
            }
            None => {
                self.ttls.remove(&key);
            }
        }
        self.payloads.insert(key, encoded.payload);
        self.stats.record_set();
        evicted
    }

    /// Fetch and decode a payload. A corrupt payload is dropped and treated
    /// as absent.
    pub fn get(&mut self, key: &str) -> Option<Bytes> {
        let payload = match self.peek_raw(key) {
            Some(payload) => payload,
            None => return None,
        };

        match self.codec.decode(&payload) {
            Ok((bytes, decompressed)) => {
                if decompressed {
                    self.stats.record_decompression();
                }
                Some(bytes)
            }
            Err(e) => {
                warn!(key, error = %e, "dropping undecodable cold entry");
                self.drop_entry(key);
                None
            }
        }
    }

    /// Fetch the tagged payload without decoding. Counts the hit/miss and
    /// refreshes recency; callers decode via [`Self::codec`] outside the
    /// store's lock.
    pub fn peek_raw(&mut self, key: &str) -> Option<Vec<u8>> {
        let now = self.clock.now_ms();

        if self.is_expired(key, now) {
            self.drop_entry(key);
            self.stats.record_expiration();
            self.stats.record_miss();
            return None;
        }

        match self.payloads.shift_remove(key) {
            Some(payload) => {
                self.payloads.insert(key.to_string(), payload.clone());
                self.stats.record_hit();
                Some(payload)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Remove an entry for promotion, returning its payload and expiry
    pub fn take_for_promotion(&mut self, key: &str) -> Option<(Vec<u8>, Option<u64>)> {
        let payload = self.payloads.shift_remove(key)?;
        self.stats
            .sub_resident_bytes(Self::footprint(key, &payload));
        let expires_at = self.ttls.remove(key);
        Some((payload, expires_at))
    }

    pub fn expires_at(&self, key: &str) -> Option<u64> {
        self.ttls.get(key).copied()
    }

    pub fn has(&mut self, key: &str) -> bool {
        let now = self.clock.now_ms();
        if !self.payloads.contains_key(key) {
            return false;
        }
        if self.is_expired(key, now) {
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
        let count = self.payloads.len();
        self.payloads.clear();
        self.ttls.clear();
        self.stats
            .bytes_resident
            .store(0, std::sync::atomic::Ordering::Relaxed);
        count
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.payloads.keys().cloned().collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stored bytes including per-entry overhead
    pub fn stored_bytes(&self) -> u64 {
        self.stats.resident_bytes()
    }

    /// Sweep expired payloads; returns the reclaimed keys
    pub fn cleanup_expired(&mut self) -> Vec<String> {
        let now = self.clock.now_ms();
        let expired: Vec<String> = self
            .ttls
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            self.drop_entry(key);
            self.stats.record_expiration();
        }

        self.stats.record_cleanup();
        expired
    }

    fn is_expired(&self, key: &str, now: u64) -> bool {
        match self.ttls.get(key) {
            Some(deadline) => now >= *deadline,
            None => false,
        }
    }

    fn drop_entry(&mut self, key: &str) -> bool {
        self.ttls.remove(key);
        match self.payloads.shift_remove(key) {
            Some(payload) => {
                self.stats
                    .sub_resident_bytes(Self::footprint(key, &payload));
                true
            }
            None => false,
        }
    }

    fn footprint(key: &str, payload: &[u8]) -> u64 {
        payload.len() as u64 + key.len() as u64 + ENTRY_OVERHEAD_BYTES
    }
}

impl std::fmt::Debug for CompressedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedStore")
            .field("len", &self.payloads.len())
            .field("max_size", &self.max_size)
            .field("threshold", &self.codec.threshold())
            .finish()
    }
}
