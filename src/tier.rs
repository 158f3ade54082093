//! Cache tier definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three tiers of the multi-tier cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// Hot tier: uncompressed, small, long TTL
    L1Hot,
    /// Warm tier: uncompressed, medium
    L2Warm,
    /// Cold tier: compressed, largest
    L3Cold,
}

impl CacheTier {
    /// Tier an entry moves to when evicted from this one
    pub fn demotion_target(&self) -> Option<CacheTier> {
        match self {
            CacheTier::L1Hot => Some(CacheTier::L2Warm),
            CacheTier::L2Warm => Some(CacheTier::L3Cold),
            CacheTier::L3Cold => None,
        }
    }

    /// Tier an entry moves to when promoted from this one
    pub fn promotion_target(&self) -> Option<CacheTier> {
        match self {
            CacheTier::L1Hot => None,
            CacheTier::L2Warm => Some(CacheTier::L1Hot),
            CacheTier::L3Cold => Some(CacheTier::L2Warm),
        }
    }

    /// All tiers in probe order
    pub fn lookup_order() -> &'static [CacheTier] {
        &[CacheTier::L1Hot, CacheTier::L2Warm, CacheTier::L3Cold]
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTier::L1Hot => write!(f, "L1-hot"),
            CacheTier::L2Warm => write!(f, "L2-warm"),
            CacheTier::L3Cold => write!(f, "L3-cold"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demotion_chain() {
        assert_eq!(CacheTier::L1Hot.demotion_target(), Some(CacheTier::L2Warm));
        assert_eq!(CacheTier::L2Warm.demotion_target(), Some(CacheTier::L3Cold));
        assert_eq!(CacheTier::L3Cold.demotion_target(), None);
    }

    #[test]
    fn test_promotion_chain() {
        assert_eq!(CacheTier::L1Hot.promotion_target(), None);
        assert_eq!(CacheTier::L2Warm.promotion_target(), Some(CacheTier::L1Hot));
        assert_eq!(CacheTier::L3Cold.promotion_target(), Some(CacheTier::L2Warm));
    }

    #[test]
    fn test_lookup_order() {
        assert_eq!(
            CacheTier::lookup_order(),
            &[CacheTier::L1Hot, CacheTier::L2Warm, CacheTier::L3Cold]
        );
    }
}
