//! Prompt Cache - Multi-Strategy In-Process Caching Engine
//!
//! The caching core of a prompt content service: store, read, and serve
//! prompt text, rendered templates, metadata, and search results from
//! memory, with predictive warming and runtime self-tuning. The service's
//! transport façades consume this crate; nothing here owns a wire protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        CacheSystem (façade)                          │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌────────────────────┐  ┌─────────────────────┐   │
//! │  │   Simple     │  │     MultiTier      │  │      Adaptive       │   │
//! │  │   (LRU)      │  │  L1 / L2 / L3      │  │   LRU | LFU | ARC   │   │
//! │  │              │  │  + compression     │  │   + selector        │   │
//! │  └──────────────┘  └────────────────────┘  └─────────────────────┘   │
//! │          │                   │                        │              │
//! │          └───────────────────┼────────────────────────┘              │
//! │                              │                                       │
//! │   ┌──────────────────┐  ┌────┴─────────┐  ┌─────────────────────┐    │
//! │   │ PatternAnalyzer  │─▶│    Warmer    │  │      AutoTuner      │    │
//! │   │ temporal/seq/user│  │  (Loader)    │  │   knob adjustment   │    │
//! │   └──────────────────┘  └──────────────┘  └─────────────────────┘    │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                 CacheRegistry (named partitions)                     │
//! │     hot_prompts │ templates │ metadata │ search_results              │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use prompt_cache::{CacheConfig, CacheSystem, Strategy};
//! use bytes::Bytes;
//!
//! let system = CacheSystem::new(CacheConfig::with_strategy(Strategy::MultiTier));
//! system.start(); // arm cleanup/warming/optimization timers
//!
//! system.set("prompts/greeting", Bytes::from("Hello!"), None, None)?;
//! let value = system.get("prompts/greeting", None);
//!
//! let stats = system.system_stats();
//! println!("hit rate: {:.1}%", stats.cache.hit_rate * 100.0);
//!
//! system.destroy();
//! ```
//!
//! # Modules
//!
//! - [`lru`], [`lfu`], [`arc`]: replacement algorithms
//! - [`multi_tier`]: hot/warm/cold tiers over a compressed cold store
//! - [`adaptive`]: runtime algorithm selection
//! - [`analyzer`], [`warmer`]: access patterns and predictive warming
//! - [`system`], [`tuner`]: the façade and its self-tuning
//! - [`registry`]: named partitions

pub mod adaptive;
pub mod analyzer;
pub mod arc;
pub mod clock;
pub mod compressed;
pub mod compression;
pub mod config;
pub mod entry;
pub mod error;
pub mod events;
pub mod lfu;
pub mod lru;
pub mod multi_tier;
pub mod registry;
pub mod stats;
pub mod system;
pub mod temperature;
pub mod tier;
pub mod tuner;
pub mod warmer;

// Re-export commonly used types
pub use adaptive::{AdaptiveCache, AdaptiveSelector, Algorithm};
pub use analyzer::{AccessContext, PatternAnalyzer, Prediction, PredictionReason};
pub use arc::ArcCache;
pub use clock::{Clock, ClockRef, ManualClock, SystemClock};
pub use compressed::{Codec, CompressedStore};
pub use compression::{
    CompressionAlgorithm, Compressor, CompressorRef, Lz4Compressor, NoopCompressor,
    SnappyCompressor, ZstdCompressor,
};
pub use config::{CacheConfig, Strategy};
pub use entry::{CacheEntry, EntryMetadata};
pub use error::{Error, Result};
pub use events::CacheEvent;
pub use lfu::LfuCache;
pub use lru::LruCache;
pub use multi_tier::{MultiTierCache, MultiTierStats, TierSnapshot};
pub use registry::{
    CacheRegistry, RegistryStats, PARTITION_HOT_PROMPTS, PARTITION_METADATA,
    PARTITION_SEARCH_RESULTS, PARTITION_TEMPLATES,
};
pub use stats::{CacheStats, StatsSnapshot};
pub use system::{CacheSystem, SystemStats, WarmingSnapshot};
pub use temperature::{Temperature, TemperatureTracker};
pub use tier::CacheTier;
pub use tuner::{AutoTuner, Knobs, TuningAction, TuningInputs};
pub use warmer::{DirectoryLoader, Loader, LoaderRef, WarmTarget, Warmer, WarmingReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
