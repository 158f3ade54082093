//! Engine configuration
//!
//! One explicit record with every recognized knob. Absent fields take the
//! documented defaults; the service layer builds these from its own options
//! parsing.

use crate::clock::ClockRef;
use crate::compression::CompressorRef;
use crate::warmer::LoaderRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which cache implementation backs the façade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Single approximate-LRU cache
    #[default]
    Simple,
    /// Hot/warm/cold tiers with a compressed cold tier
    #[serde(rename = "multitier")]
    MultiTier,
    /// Runtime-selected replacement algorithm (LRU/LFU/ARC)
    Adaptive,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Simple => write!(f, "simple"),
            Strategy::MultiTier => write!(f, "multitier"),
            Strategy::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// Full configuration for one cache system instance
#[derive(Clone)]
pub struct CacheConfig {
    /// Cache implementation selection
    pub strategy: Strategy,

    // Sizes (entry counts)
    pub max_size: usize,
    pub l1_max_size: usize,
    pub l2_max_size: usize,
    pub l3_max_size: usize,
    /// Bound on queued warming contexts
    pub queue_max_size: usize,

    // TTLs (milliseconds)
    pub default_ttl_ms: u64,
    pub l1_ttl_ms: u64,
    pub l2_ttl_ms: u64,
    pub l3_ttl_ms: u64,

    // Thresholds
    /// Accesses within the temperature window before a key counts as hot
    pub hot_threshold: u32,
    /// Accesses before a key counts as warm
    pub warm_threshold: u32,
    /// Payloads below this many bytes are stored uncompressed in the cold tier
    pub compression_threshold: usize,
    /// Fraction of the memory budget that triggers pressure eviction
    pub memory_threshold: f64,
    /// Resident-byte budget used by memory-pressure eviction
    pub memory_budget_bytes: u64,
    /// Score margin a challenger algorithm must win by before a switch
    pub switch_threshold: f64,
    /// Minimum prediction confidence the warmer will load for
    pub min_confidence: f64,
    /// Window for temperature decay
    pub temperature_window_ms: u64,

    // Intervals and windows
    pub cleanup_interval: Duration,
    /// Requests between algorithm evaluations
    pub evaluation_window: u64,
    pub warming_interval: Duration,
    pub optimization_interval: Duration,

    // Adaptive and warming limits
    /// Most-recent entries migrated across an algorithm switch
    pub migration_limit: usize,
    /// Bound on tracked access-pattern records
    pub max_patterns: usize,
    /// Predictions returned per context
    pub max_predictions: usize,
    /// Samples before a prediction reaches full confidence
    pub min_samples: u64,
    /// Keys loaded per warming cycle
    pub max_warm_items: usize,

    // Flags
    pub enable_compression: bool,
    pub enable_warming: bool,
    pub auto_optimize: bool,
    pub enable_stats: bool,

    // Injected collaborators
    pub data_loader: Option<LoaderRef>,
    pub compressor: Option<CompressorRef>,
    pub clock: Option<ClockRef>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Simple,
            max_size: 1000,
            l1_max_size: 100,
            l2_max_size: 500,
            l3_max_size: 2000,
            queue_max_size: 100,
            default_ttl_ms: 600_000,
            l1_ttl_ms: 1_800_000,
            l2_ttl_ms: 900_000,
            l3_ttl_ms: 3_600_000,
            hot_threshold: 5,
            warm_threshold: 2,
            compression_threshold: 1024,
            memory_threshold: 0.8,
            memory_budget_bytes: 64 * 1024 * 1024,
            switch_threshold: 0.05,
            min_confidence: 0.3,
            temperature_window_ms: 60_000,
            cleanup_interval: Duration::from_secs(60),
            evaluation_window: 100,
            warming_interval: Duration::from_secs(30),
            optimization_interval: Duration::from_secs(120),
            migration_limit: 50,
            max_patterns: 1000,
            max_predictions: 10,
            min_samples: 5,
            max_warm_items: 20,
            enable_compression: true,
            enable_warming: true,
            auto_optimize: true,
            enable_stats: true,
            data_loader: None,
            compressor: None,
            clock: None,
        }
    }
}

impl CacheConfig {
    /// Config with a given strategy and the documented defaults elsewhere
    pub fn with_strategy(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn default_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.default_ttl_ms = ttl_ms;
        self
    }

    pub fn hot_threshold(mut self, threshold: u32) -> Self {
        self.hot_threshold = threshold;
        self
    }

    pub fn clock(mut self, clock: ClockRef) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn data_loader(mut self, loader: LoaderRef) -> Self {
        self.data_loader = Some(loader);
        self
    }

    pub fn compressor(mut self, compressor: CompressorRef) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn enable_warming(mut self, enabled: bool) -> Self {
        self.enable_warming = enabled;
        self
    }

    pub fn auto_optimize(mut self, enabled: bool) -> Self {
        self.auto_optimize = enabled;
        self
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("strategy", &self.strategy)
            .field("max_size", &self.max_size)
            .field("l1_max_size", &self.l1_max_size)
            .field("l2_max_size", &self.l2_max_size)
            .field("l3_max_size", &self.l3_max_size)
            .field("default_ttl_ms", &self.default_ttl_ms)
            .field("hot_threshold", &self.hot_threshold)
            .field("warm_threshold", &self.warm_threshold)
            .field("compression_threshold", &self.compression_threshold)
            .field("switch_threshold", &self.switch_threshold)
            .field("min_confidence", &self.min_confidence)
            .field("enable_compression", &self.enable_compression)
            .field("enable_warming", &self.enable_warming)
            .field("auto_optimize", &self.auto_optimize)
            .field("data_loader", &self.data_loader.as_ref().map(|_| "<loader>"))
            .field("compressor", &self.compressor.as_ref().map(|_| "<compressor>"))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.strategy, Strategy::Simple);
        assert_eq!(config.max_size, 1000);
        assert_eq!(config.compression_threshold, 1024);
        assert_eq!(config.default_ttl_ms, 600_000);
        assert!(config.enable_warming);
        assert!(config.data_loader.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let config = CacheConfig::with_strategy(Strategy::MultiTier)
            .max_size(50)
            .hot_threshold(3)
            .enable_warming(false);

        assert_eq!(config.strategy, Strategy::MultiTier);
        assert_eq!(config.max_size, 50);
        assert_eq!(config.hot_threshold, 3);
        assert!(!config.enable_warming);
    }

    #[test]
    fn test_strategy_serde_names() {
        assert_eq!(serde_json::to_string(&Strategy::Simple).unwrap(), "\"simple\"");
        assert_eq!(
            serde_json::to_string(&Strategy::MultiTier).unwrap(),
            "\"multitier\""
        );
        assert_eq!(
            serde_json::from_str::<Strategy>("\"adaptive\"").unwrap(),
            Strategy::Adaptive
        );
    }
}
