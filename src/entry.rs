//! Cache entry types
//!
//! A [`CacheEntry`] is uniquely owned by the cache (or tier) it resides in;
//! moving an entry between tiers transfers the whole value.

use bytes::Bytes;
use serde::Serialize;

/// Fixed per-entry bookkeeping overhead used for resident-byte estimates
pub const ENTRY_OVERHEAD_BYTES: u64 = 64;

/// A cached value with access bookkeeping. All times are monotonic
/// milliseconds from the owning cache's clock.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached payload
    pub value: Bytes,
    /// Time the entry was created
    pub created_at: u64,
    /// Absolute expiry time (None = never expires)
    pub expires_at: Option<u64>,
    /// Time of the most recent access
    pub last_accessed: u64,
    /// Number of reads served from this entry
    pub access_count: u64,
}

impl CacheEntry {
    /// Create a new entry at `now` with an optional TTL in milliseconds
    pub fn new(value: Bytes, now: u64, ttl_ms: Option<u64>) -> Self {
        Self {
            value,
            created_at: now,
            expires_at: ttl_ms.map(|ttl| now.saturating_add(ttl)),
            last_accessed: now,
            access_count: 0,
        }
    }

    /// Check expiry against the given time
    pub fn is_expired(&self, now: u64) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// Record a read
    pub fn record_access(&mut self, now: u64) {
        self.last_accessed = now;
        self.access_count += 1;
    }

    /// Remaining lifetime at `now`, if bounded
    pub fn remaining_ttl(&self, now: u64) -> Option<u64> {
        self.expires_at.map(|deadline| deadline.saturating_sub(now))
    }

    /// Estimated resident footprint of this entry under the given key
    pub fn estimated_bytes(&self, key: &str) -> u64 {
        self.value.len() as u64 + key.len() as u64 + ENTRY_OVERHEAD_BYTES
    }
}

/// Read-only view of an entry's bookkeeping, for inspection APIs
#[derive(Debug, Clone, Serialize)]
pub struct EntryMetadata {
    pub created_at: u64,
    pub expires_at: Option<u64>,
    pub last_accessed: u64,
    pub access_count: u64,
    pub size_bytes: u64,
}

impl EntryMetadata {
    /// Build a metadata view from an entry
    pub fn from_entry(key: &str, entry: &CacheEntry) -> Self {
        Self {
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            last_accessed: entry.last_accessed,
            access_count: entry.access_count,
            size_bytes: entry.estimated_bytes(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expiry() {
        let entry = CacheEntry::new(Bytes::from("data"), 100, Some(50));
        assert_eq!(entry.expires_at, Some(150));
        assert!(!entry.is_expired(149));
        assert!(entry.is_expired(150));
        assert!(entry.is_expired(1000));

        let forever = CacheEntry::new(Bytes::from("data"), 100, None);
        assert!(!forever.is_expired(u64::MAX));
    }

    #[test]
    fn test_entry_access_tracking() {
        let mut entry = CacheEntry::new(Bytes::from("data"), 0, None);
        assert_eq!(entry.access_count, 0);

        entry.record_access(10);
        entry.record_access(20);
        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed, 20);
    }

    #[test]
    fn test_remaining_ttl() {
        let entry = CacheEntry::new(Bytes::from("x"), 0, Some(1000));
        assert_eq!(entry.remaining_ttl(400), Some(600));
        assert_eq!(entry.remaining_ttl(2000), Some(0));
        assert_eq!(CacheEntry::new(Bytes::from("x"), 0, None).remaining_ttl(5), None);
    }

    #[test]
    fn test_estimated_bytes() {
        let entry = CacheEntry::new(Bytes::from("0123456789"), 0, None);
        assert_eq!(entry.estimated_bytes("key"), 10 + 3 + ENTRY_OVERHEAD_BYTES);
    }
}
