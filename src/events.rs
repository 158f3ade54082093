//! Cache events
//!
//! The multi-tier cache broadcasts these for monitoring. Delivery is
//! best-effort: with no subscribers the send is dropped on the floor.

use crate::tier::CacheTier;
use serde::{Deserialize, Serialize};

/// Events emitted by the multi-tier cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CacheEvent {
    /// Entry was stored
    Put {
        key: String,
        tier: CacheTier,
        compressed: bool,
    },

    /// Lookup served from a tier
    Hit {
        key: String,
        tier: CacheTier,
        promoted: bool,
    },

    /// Lookup missed every tier
    Miss { key: String },

    /// Entry was deleted explicitly
    Delete { key: String },

    /// Entry was evicted for capacity
    Evict { key: String, tier: CacheTier },

    /// Entry expired and was reclaimed
    Expired { key: String, tier: CacheTier },

    /// Entry moved up a tier
    Promote {
        key: String,
        from: CacheTier,
        to: CacheTier,
    },

    /// Entry moved down a tier
    Demote {
        key: String,
        from: CacheTier,
        to: CacheTier,
    },

    /// All tiers cleared
    Cleared { entries_removed: usize },
}

impl CacheEvent {
    pub fn hit(key: &str, tier: CacheTier, promoted: bool) -> Self {
        CacheEvent::Hit {
            key: key.to_string(),
            tier,
            promoted,
        }
    }

    pub fn miss(key: &str) -> Self {
        CacheEvent::Miss {
            key: key.to_string(),
        }
    }

    pub fn put(key: &str, tier: CacheTier, compressed: bool) -> Self {
        CacheEvent::Put {
            key: key.to_string(),
            tier,
            compressed,
        }
    }

    pub fn evict(key: &str, tier: CacheTier) -> Self {
        CacheEvent::Evict {
            key: key.to_string(),
            tier,
        }
    }

    pub fn expired(key: &str, tier: CacheTier) -> Self {
        CacheEvent::Expired {
            key: key.to_string(),
            tier,
        }
    }

    pub fn promote(key: &str, from: CacheTier, to: CacheTier) -> Self {
        CacheEvent::Promote {
            key: key.to_string(),
            from,
            to,
        }
    }

    pub fn demote(key: &str, from: CacheTier, to: CacheTier) -> Self {
        CacheEvent::Demote {
            key: key.to_string(),
            from,
            to,
        }
    }

    /// Key this event concerns, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            CacheEvent::Put { key, .. }
            | CacheEvent::Hit { key, .. }
            | CacheEvent::Miss { key }
            | CacheEvent::Delete { key }
            | CacheEvent::Evict { key, .. }
            | CacheEvent::Expired { key, .. }
            | CacheEvent::Promote { key, .. }
            | CacheEvent::Demote { key, .. } => Some(key),
            CacheEvent::Cleared { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_key_accessor() {
        let hit = CacheEvent::hit("prompts/greeting", CacheTier::L1Hot, false);
        assert_eq!(hit.key(), Some("prompts/greeting"));

        let evicted = CacheEvent::evict("old", CacheTier::L3Cold);
        assert_eq!(evicted.key(), Some("old"));

        let expired = CacheEvent::expired("stale", CacheTier::L2Warm);
        assert_eq!(expired.key(), Some("stale"));

        let cleared = CacheEvent::Cleared { entries_removed: 3 };
        assert_eq!(cleared.key(), None);
    }

    #[test]
    fn test_event_serializes() {
        let event = CacheEvent::promote("k", CacheTier::L3Cold, CacheTier::L2Warm);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Promote"));
        assert!(json.contains("l3cold") || json.contains("l3"));
    }
}
