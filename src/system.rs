//! Cache system façade
//!
//! Composes a strategy-selected core cache with the pattern analyzer, the
//! warmer, and the auto-tuner, and owns the background timers (cleanup,
//! warming, optimization). `destroy` cancels every timer, aborts in-flight
//! warming, and is idempotent.

use crate::adaptive::AdaptiveCache;
use crate::analyzer::{AccessContext, PatternAnalyzer};
use crate::clock::{system_clock, ClockRef};
use crate::config::{CacheConfig, Strategy};
use crate::error::{Error, Result};
use crate::lru::LruCache;
use crate::multi_tier::{MultiTierCache, MultiTierStats};
use crate::stats::{CacheStats, StatsSnapshot};
use crate::tuner::{AutoTuner, Knobs, TuningAction, TuningInputs};
use crate::warmer::{WarmTarget, Warmer, WarmingReport};
use bytes::Bytes;
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// =============================================================================
// Core cache dispatch
// =============================================================================

/// The strategy-selected cache behind the façade
enum CoreCache {
    Simple(Mutex<LruCache>),
    MultiTier(MultiTierCache),
    Adaptive(Mutex<AdaptiveCache>),
}

impl CoreCache {
    fn get(&self, key: &str) -> Option<Bytes> {
        match self {
            CoreCache::Simple(cache) => cache.lock().get(key),
            CoreCache::MultiTier(cache) => cache.get(key),
            CoreCache::Adaptive(cache) => cache.lock().get(key),
        }
    }

    fn set(&self, key: &str, value: Bytes, ttl_ms: Option<u64>) -> bool {
        match self {
            CoreCache::Simple(cache) => cache.lock().set(key, value, ttl_ms),
            CoreCache::MultiTier(cache) => cache.set(key, value, ttl_ms),
            CoreCache::Adaptive(cache) => cache.lock().set(key, value, ttl_ms),
        }
    }

    fn has(&self, key: &str) -> bool {
        match self {
            CoreCache::Simple(cache) => cache.lock().has(key),
            CoreCache::MultiTier(cache) => cache.has(key),
            CoreCache::Adaptive(cache) => cache.lock().has(key),
        }
    }

    fn delete(&self, key: &str) -> bool {
        match self {
            CoreCache::Simple(cache) => cache.lock().delete(key),
            CoreCache::MultiTier(cache) => cache.delete(key),
            CoreCache::Adaptive(cache) => cache.lock().delete(key),
        }
    }

    fn clear(&self) -> usize {
        match self {
            CoreCache::Simple(cache) => cache.lock().clear(),
            CoreCache::MultiTier(cache) => cache.clear(),
            CoreCache::Adaptive(cache) => cache.lock().clear(),
        }
    }

    fn len(&self) -> usize {
        match self {
            CoreCache::Simple(cache) => cache.lock().len(),
            CoreCache::MultiTier(cache) => cache.len(),
            CoreCache::Adaptive(cache) => cache.lock().len(),
        }
    }

    fn keys(&self) -> Vec<String> {
        match self {
            CoreCache::Simple(cache) => cache.lock().keys(),
            CoreCache::MultiTier(cache) => cache.keys(),
            CoreCache::Adaptive(cache) => cache.lock().keys(),
        }
    }

    fn stats(&self) -> StatsSnapshot {
        match self {
            CoreCache::Simple(cache) => cache.lock().stats(),
            CoreCache::MultiTier(cache) => cache.stats(),
            CoreCache::Adaptive(cache) => cache.lock().stats(),
        }
    }

    fn cleanup_expired(&self) -> usize {
        match self {
            CoreCache::Simple(cache) => cache.lock().cleanup_expired().len(),
            CoreCache::MultiTier(cache) => cache.cleanup_expired(),
            CoreCache::Adaptive(cache) => cache.lock().cleanup_expired(),
        }
    }

    fn optimize_memory(&self) -> usize {
        match self {
            CoreCache::Simple(cache) => cache.lock().optimize_memory(),
            // tier capacities already bound the multi-tier footprint
            CoreCache::MultiTier(_) => 0,
            CoreCache::Adaptive(cache) => cache.lock().optimize_memory(),
        }
    }
}

impl WarmTarget for CoreCache {
    fn contains(&self, key: &str) -> bool {
        self.has(key)
    }

    fn install(&self, key: &str, value: Bytes, ttl_ms: Option<u64>) -> bool {
        self.set(key, value, ttl_ms)
    }
}

// =============================================================================
// Stats envelope
// =============================================================================

/// Warming counters at a point in time
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmingSnapshot {
    pub cycles: u64,
    pub warmed: u64,
    pub skipped: u64,
    pub errors: u64,
    pub success_rate: f64,
    pub min_confidence: f64,
}

/// Full statistics for one cache system
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub strategy: Strategy,
    /// Underlying cache envelope
    pub cache: StatsSnapshot,
    /// The façade's own request counters
    pub facade: StatsSnapshot,
    pub warming: WarmingSnapshot,
    pub tracked_patterns: usize,
    pub tuning_passes: u64,
}

// =============================================================================
// Cache system
// =============================================================================

/// Top-level cache with warming and self-tuning
pub struct CacheSystem {
    core: Arc<CoreCache>,
    analyzer: Mutex<PatternAnalyzer>,
    warmer: Arc<Warmer>,
    tuner: AutoTuner,
    config: CacheConfig,
    stats: CacheStats,
    tuning_passes: AtomicU64,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    destroyed: AtomicBool,
    clock: ClockRef,
}

impl CacheSystem {
    /// Build a cache system. Background timers are armed by [`Self::start`].
    pub fn new(config: CacheConfig) -> Arc<Self> {
        let clock = config.clock.clone().unwrap_or_else(system_clock);

        let core = match config.strategy {
            Strategy::Simple => CoreCache::Simple(Mutex::new(
                LruCache::new(config.max_size, config.default_ttl_ms, clock.clone())
                    .with_memory_budget(config.memory_threshold, config.memory_budget_bytes),
            )),
            Strategy::MultiTier => {
                CoreCache::MultiTier(MultiTierCache::new(&config, clock.clone()))
            }
            Strategy::Adaptive => {
                CoreCache::Adaptive(Mutex::new(AdaptiveCache::new(&config, clock.clone())))
            }
        };

        let analyzer = PatternAnalyzer::new(
            config.max_patterns,
            config.max_predictions,
            config.min_samples,
            clock.clone(),
        );

        let warmer = Warmer::new(
            config.data_loader.clone(),
            config.min_confidence,
            config.max_warm_items,
            config.queue_max_size,
        );

        info!(strategy = %config.strategy, "cache system created");

        Arc::new(Self {
            core: Arc::new(core),
            analyzer: Mutex::new(analyzer),
            warmer: Arc::new(warmer),
            tuner: AutoTuner::new(),
            config,
            stats: CacheStats::new(),
            tuning_passes: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            clock,
        })
    }

    /// Arm the background timers: cleanup, warming, optimization.
    /// Requires a tokio runtime; calling twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) || self.destroyed.load(Ordering::SeqCst) {
            return;
        }

        let mut tasks = self.tasks.lock();

        {
            let system = Arc::clone(self);
            let cancel = self.cancel.clone();
            let period = self.config.cleanup_interval;
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await; // the immediate first tick
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => {
                            system.run_cleanup();
                        }
                    }
                }
            }));
        }

        if self.config.enable_warming && self.config.data_loader.is_some() {
            let system = Arc::clone(self);
            let cancel = self.cancel.clone();
            let period = self.config.warming_interval;
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await;
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => {
                            system
                                .warmer
                                .run_pending(&system.analyzer, system.core.as_ref())
                                .await;
                        }
                    }
                }
            }));
        }

        if self.config.auto_optimize {
            let system = Arc::clone(self);
            let cancel = self.cancel.clone();
            let period = self.config.optimization_interval;
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await;
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => {
                            system.optimize();
                        }
                    }
                }
            }));
        }

        debug!(tasks = tasks.len(), "background timers armed");
    }

    /// Look up a key. A context feeds the pattern analyzer and queues the
    /// user for the next warming cycle.
    pub fn get(&self, key: &str, context: Option<&AccessContext>) -> Option<Bytes> {
        if self.destroyed.load(Ordering::SeqCst) {
            return None;
        }

        if self.config.enable_warming {
            let ctx = context.cloned().unwrap_or_default();
            self.analyzer.lock().record_access(key, &ctx);
        }

        let result = self.core.get(key);

        if self.config.enable_stats {
            if result.is_some() {
                self.stats.record_hit();
            } else {
                self.stats.record_miss();
            }
        }

        if result.is_none() {
            if let Some(ctx) = context {
                if ctx.user_id.is_some() && self.config.enable_warming {
                    // queue for the next warming cycle; a full queue is not an error here
                    if let Err(e) = self.warmer.note_context(ctx.clone()) {
                        debug!(error = %e, "warming queue full, context dropped");
                    }
                }
            }
        }

        result
    }

    /// Store a value. Only bad input errors surface; a full cache is handled
    /// by eviction, never an error.
    pub fn set(
        &self,
        key: &str,
        value: Bytes,
        ttl_ms: Option<u64>,
        _context: Option<&AccessContext>,
    ) -> Result<bool> {
        if key.is_empty() {
            return Err(Error::InvalidInput("empty key".into()));
        }
        if ttl_ms == Some(0) {
            return Err(Error::InvalidInput("zero ttl".into()));
        }
        if self.destroyed.load(Ordering::SeqCst) {
            return Ok(false);
        }

        if self.config.enable_stats {
            self.stats.record_set();
        }
        Ok(self.core.set(key, value, ttl_ms))
    }

    pub fn has(&self, key: &str) -> bool {
        !self.destroyed.load(Ordering::SeqCst) && self.core.has(key)
    }

    pub fn delete(&self, key: &str) -> bool {
        if self.destroyed.load(Ordering::SeqCst) {
            return false;
        }
        if self.config.enable_stats {
            self.stats.record_delete();
        }
        self.core.delete(key)
    }

    /// Delete all keys matching a pattern; returns how many went
    pub fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern)?;
        if self.destroyed.load(Ordering::SeqCst) {
            return Ok(0);
        }

        let matching: Vec<String> = self
            .core
            .keys()
            .into_iter()
            .filter(|key| regex.is_match(key))
            .collect();

        let mut removed = 0;
        for key in &matching {
            if self.core.delete(key) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Drop every entry; returns the number removed
    pub fn clear(&self) -> usize {
        self.core.clear()
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn strategy(&self) -> Strategy {
        self.config.strategy
    }

    /// Underlying cache envelope
    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats()
    }

    /// Full system statistics
    pub fn system_stats(&self) -> SystemStats {
        let warmer_stats = self.warmer.stats();
        SystemStats {
            strategy: self.config.strategy,
            cache: self.core.stats(),
            facade: self.stats.snapshot(),
            warming: WarmingSnapshot {
                cycles: warmer_stats.cycles.load(Ordering::Relaxed),
                warmed: warmer_stats.warmed.load(Ordering::Relaxed),
                skipped: warmer_stats.skipped.load(Ordering::Relaxed),
                errors: warmer_stats.errors.load(Ordering::Relaxed),
                success_rate: warmer_stats.success_rate(),
                min_confidence: self.warmer.min_confidence(),
            },
            tracked_patterns: self.analyzer.lock().pattern_count(),
            tuning_passes: self.tuning_passes.load(Ordering::Relaxed),
        }
    }

    /// Multi-tier breakdown, when that strategy is active
    pub fn detailed_stats(&self) -> Option<MultiTierStats> {
        match self.core.as_ref() {
            CoreCache::MultiTier(cache) => Some(cache.detailed_stats()),
            _ => None,
        }
    }

    /// Run one warming cycle for a context right now
    pub async fn warm_now(&self, context: &AccessContext) -> WarmingReport {
        if self.destroyed.load(Ordering::SeqCst) {
            return WarmingReport::default();
        }
        self.warmer
            .perform_warming(&self.analyzer, context, self.core.as_ref())
            .await
    }

    /// One cleanup pass: expired entries, then memory pressure
    pub fn run_cleanup(&self) -> usize {
        let removed = self.core.cleanup_expired();
        let evicted = self.core.optimize_memory();
        if removed + evicted > 0 {
            debug!(removed, evicted, "cleanup pass");
        }
        removed + evicted
    }

    /// One auto-tuning pass over the current knobs
    pub fn optimize(&self) {
        let cache_stats = self.core.stats();
        let warmer_stats = self.warmer.stats();
        let attempts = warmer_stats.warmed.load(Ordering::Relaxed)
            + warmer_stats.errors.load(Ordering::Relaxed);

        let mut inputs = TuningInputs {
            strategy: Some(self.config.strategy),
            hit_rate: cache_stats.hit_rate,
            warming_success_rate: (attempts > 0).then(|| warmer_stats.success_rate()),
            ..Default::default()
        };

        let mut knobs = Knobs {
            hot_threshold: self.config.hot_threshold,
            compression_threshold: self.config.compression_threshold,
            switch_threshold: self.config.switch_threshold,
            max_size: self.config.max_size,
            min_confidence: self.warmer.min_confidence(),
        };

        match self.core.as_ref() {
            CoreCache::Simple(cache) => {
                knobs.max_size = cache.lock().max_size();
            }
            CoreCache::MultiTier(cache) => {
                let detailed = cache.detailed_stats();
                inputs.l1_hit_rate = Some(detailed.l1.hit_rate());
                inputs.compression_ratio = if cache_stats.requests == 0 {
                    Some(0.0)
                } else {
                    Some(cache_stats.compressions as f64 / cache_stats.requests as f64)
                };
                knobs.hot_threshold = cache.hot_threshold();
                knobs.compression_threshold = cache.codec().threshold();
            }
            CoreCache::Adaptive(cache) => {
                let mut cache = cache.lock();
                inputs.algorithm_switches = cache.take_switches();
                knobs.switch_threshold = cache.selector().switch_threshold();
            }
        }

        let actions = self.tuner.evaluate(&inputs, &knobs);
        for action in actions {
            self.apply_action(action);
        }
        self.tuning_passes.fetch_add(1, Ordering::Relaxed);
    }

    fn apply_action(&self, action: TuningAction) {
        match (action, self.core.as_ref()) {
            (TuningAction::GrowMaxSize { to }, CoreCache::Simple(cache)) => {
                cache.lock().set_max_size(to);
            }
            (TuningAction::LowerHotThreshold { to }, CoreCache::MultiTier(cache)) => {
                cache.set_hot_threshold(to);
            }
            (TuningAction::LowerCompressionThreshold { to }, CoreCache::MultiTier(cache)) => {
                cache.codec().set_threshold(to);
            }
            (TuningAction::RaiseSwitchThreshold { to }, CoreCache::Adaptive(cache)) => {
                cache.lock().set_switch_threshold(to);
            }
            (TuningAction::LowerMinConfidence { to }, _)
            | (TuningAction::RaiseMinConfidence { to }, _) => {
                self.warmer.set_min_confidence(to);
            }
            _ => {}
        }
    }

    /// Stop timers and warming, and refuse further work. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.cancel.cancel();
        self.warmer.destroy();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }

        info!(strategy = %self.config.strategy, "cache system destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Remaining armed background tasks (post-destroy this is zero)
    pub fn active_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    /// The clock this system runs on
    pub fn clock(&self) -> &ClockRef {
        &self.clock
    }
}

impl Drop for CacheSystem {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for CacheSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSystem")
            .field("strategy", &self.config.strategy)
            .field("len", &self.len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::warmer::Loader;
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    struct EchoLoader;

    #[async_trait]
    impl Loader for EchoLoader {
        async fn load(&self, key: &str) -> Result<Option<Bytes>> {
            Ok(Some(Bytes::from(format!("v:{}", key))))
        }
    }

    fn manual_system(strategy: Strategy) -> (Arc<CacheSystem>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig::with_strategy(strategy)
            .max_size(10)
            .clock(clock.clone());
        (CacheSystem::new(config), clock)
    }

    #[test]
    fn test_set_get_roundtrip_all_strategies() {
        for strategy in [Strategy::Simple, Strategy::MultiTier, Strategy::Adaptive] {
            let (system, _clock) = manual_system(strategy);
            assert!(system.set("k", Bytes::from("v"), None, None).unwrap());
            assert_eq!(system.get("k", None), Some(Bytes::from("v")));
            assert!(system.has("k"));
            assert!(system.delete("k"));
            assert_eq!(system.get("k", None), None);
        }
    }

    #[test]
    fn test_bad_input_rejected() {
        let (system, _clock) = manual_system(Strategy::Simple);

        assert_matches!(
            system.set("", Bytes::from("v"), None, None),
            Err(Error::InvalidInput(_))
        );
        assert_matches!(
            system.set("k", Bytes::from("v"), Some(0), None),
            Err(Error::InvalidInput(_))
        );
        assert_matches!(system.delete_pattern("[bad"), Err(Error::InvalidPattern(_)));
        assert_eq!(system.len(), 0);
    }

    #[test]
    fn test_facade_counters() {
        let (system, _clock) = manual_system(Strategy::Simple);

        system.set("k", Bytes::from("v"), None, None).unwrap();
        system.get("k", None);
        system.get("missing", None);

        let stats = system.system_stats();
        assert_eq!(stats.facade.sets, 1);
        assert_eq!(stats.facade.hits, 1);
        assert_eq!(stats.facade.misses, 1);
        assert_eq!(stats.cache.hits, 1);
    }

    #[test]
    fn test_delete_pattern_across_strategies() {
        for strategy in [Strategy::Simple, Strategy::MultiTier, Strategy::Adaptive] {
            let (system, _clock) = manual_system(strategy);
            system.set("a1", Bytes::from("x"), None, None).unwrap();
            system.set("a2", Bytes::from("x"), None, None).unwrap();
            system.set("b1", Bytes::from("x"), None, None).unwrap();

            assert_eq!(system.delete_pattern("^a").unwrap(), 2);
            assert!(!system.has("a1"));
            assert!(system.has("b1"));
        }
    }

    #[tokio::test]
    async fn test_warm_now_installs_predictions() {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig::with_strategy(Strategy::Simple)
            .clock(clock.clone())
            .data_loader(Arc::new(EchoLoader));
        let system = CacheSystem::new(config);

        // analyzer learns a -> b -> c for user u
        let ctx = AccessContext::user("u");
        for _ in 0..5 {
            system.get("a", Some(&ctx));
            system.get("b", Some(&ctx));
            system.get("c", Some(&ctx));
        }
        system.get("a", Some(&ctx));
        system.get("b", Some(&ctx));

        // c is predicted and absent, so it gets loaded and installed
        system.set("a", Bytes::from("cached"), None, None).unwrap();
        system.set("b", Bytes::from("cached"), None, None).unwrap();

        let report = system.warm_now(&ctx).await;
        assert_eq!(report.warmed, 1);
        assert_eq!(report.errors, 0);
        assert_eq!(system.get("c", None), Some(Bytes::from("v:c")));
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent_and_disarms_timers() {
        let config = CacheConfig::with_strategy(Strategy::Simple)
            .data_loader(Arc::new(EchoLoader));
        let system = CacheSystem::new(config);
        system.start();
        assert!(system.active_tasks() > 0);

        system.destroy();
        system.destroy();

        assert!(system.is_destroyed());
        assert_eq!(system.active_tasks(), 0);
        assert_eq!(system.get("k", None), None);
        assert!(!system.set("k", Bytes::from("v"), None, None).unwrap());
    }

    #[test]
    fn test_simple_tuning_grows_max_size() {
        let (system, _clock) = manual_system(Strategy::Simple);

        // 45% hit rate: 9 hits, 11 misses
        for i in 0..9 {
            let key = format!("k{}", i);
            system.set(&key, Bytes::from("v"), None, None).unwrap();
            system.get(&key, None);
        }
        for i in 0..11 {
            system.get(&format!("missing{}", i), None);
        }

        system.optimize();

        match system.core.as_ref() {
            CoreCache::Simple(cache) => assert_eq!(cache.lock().max_size(), 12),
            _ => unreachable!(),
        }
        assert_eq!(system.system_stats().tuning_passes, 1);
    }

    #[test]
    fn test_multitier_tuning_lowers_hot_threshold() {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig::with_strategy(Strategy::MultiTier)
            .hot_threshold(5)
            .clock(clock.clone());
        let system = CacheSystem::new(config);

        // all traffic lands in L3, so the L1 hit rate stays at zero
        system.set("k", Bytes::from("v"), None, None).unwrap();
        system.get("k", None);
        system.get("missing", None);

        system.optimize();

        match system.core.as_ref() {
            CoreCache::MultiTier(cache) => assert_eq!(cache.hot_threshold(), 4),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_clear_counts() {
        let (system, _clock) = manual_system(Strategy::Simple);
        system.set("a", Bytes::from("1"), None, None).unwrap();
        system.set("b", Bytes::from("2"), None, None).unwrap();
        assert_eq!(system.clear(), 2);
        assert!(system.is_empty());
    }
}
