//! Adaptive algorithm selection
//!
//! Three replacement algorithms live side by side; all traffic routes
//! through the active one. The selector scores each algorithm over a request
//! window, mixing hit rate with response time, and switches when a
//! challenger clears the incumbent by the configured margin. A switch
//! moves the most recent entries across so the winner does not start cold;
//! the outgoing instance is emptied, so inactive instances never hold
//! entries and can never serve a stale value after a later switch back.

use crate::arc::ArcCache;
use crate::clock::ClockRef;
use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::lfu::LfuCache;
use crate::lru::LruCache;
use crate::stats::StatsSnapshot;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Replacement algorithm identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Lru,
    Lfu,
    Arc,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Lru, Algorithm::Lfu, Algorithm::Arc];

    fn index(self) -> usize {
        match self {
            Algorithm::Lru => 0,
            Algorithm::Lfu => 1,
            Algorithm::Arc => 2,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Lru => write!(f, "lru"),
            Algorithm::Lfu => write!(f, "lfu"),
            Algorithm::Arc => write!(f, "arc"),
        }
    }
}

// =============================================================================
// Selector
// =============================================================================

/// Windowed per-algorithm performance sample
#[derive(Debug, Clone, Default)]
pub struct AlgorithmMetrics {
    pub hits: u64,
    pub misses: u64,
    pub total_time_ms: f64,
    pub requests: u64,
}

impl AlgorithmMetrics {
    pub fn hit_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.requests as f64
        }
    }

    pub fn avg_response_ms(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.total_time_ms / self.requests as f64
        }
    }

    /// Composite score: 70% hit rate, 30% response time (100ms = worthless)
    pub fn score(&self) -> f64 {
        let response_score = (1.0 - self.avg_response_ms() / 100.0).max(0.0);
        0.7 * self.hit_rate() + 0.3 * response_score
    }
}

/// Scores algorithms over a request window and decides switches
#[derive(Debug)]
pub struct AdaptiveSelector {
    metrics: [AlgorithmMetrics; 3],
    evaluation_window: u64,
    switch_threshold: f64,
    since_evaluation: u64,
    total_switches: u64,
    switches_since_drain: u64,
}

impl AdaptiveSelector {
    pub fn new(evaluation_window: u64, switch_threshold: f64) -> Self {
        Self {
            metrics: Default::default(),
            evaluation_window: evaluation_window.max(1),
            switch_threshold,
            since_evaluation: 0,
            total_switches: 0,
            switches_since_drain: 0,
        }
    }

    /// Record one request outcome for an algorithm
    pub fn record(&mut self, algorithm: Algorithm, hit: bool, elapsed_ms: f64) {
        let m = &mut self.metrics[algorithm.index()];
        m.requests += 1;
        m.total_time_ms += elapsed_ms;
        if hit {
            m.hits += 1;
        } else {
            m.misses += 1;
        }
        self.since_evaluation += 1;
    }

    pub fn score(&self, algorithm: Algorithm) -> f64 {
        self.metrics[algorithm.index()].score()
    }

    pub fn metrics(&self, algorithm: Algorithm) -> &AlgorithmMetrics {
        &self.metrics[algorithm.index()]
    }

    /// True once a full evaluation window of requests has been recorded
    pub fn should_evaluate(&self) -> bool {
        self.since_evaluation >= self.evaluation_window
    }

    /// Pick the best-scoring algorithm; switch when it beats the incumbent
    /// by the threshold. Metrics are reset either way.
    pub fn evaluate_and_switch(&mut self, incumbent: Algorithm) -> Option<Algorithm> {
        let best = Algorithm::ALL
            .into_iter()
            .max_by(|a, b| {
                self.score(*a)
                    .partial_cmp(&self.score(*b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(incumbent);

        let decision = if best != incumbent
            && self.score(best) > self.score(incumbent) + self.switch_threshold
        {
            Some(best)
        } else {
            None
        };

        if decision.is_some() {
            self.total_switches += 1;
            self.switches_since_drain += 1;
        }

        self.metrics = Default::default();
        self.since_evaluation = 0;
        decision
    }

    pub fn switch_threshold(&self) -> f64 {
        self.switch_threshold
    }

    pub fn set_switch_threshold(&mut self, threshold: f64) {
        self.switch_threshold = threshold;
    }

    pub fn total_switches(&self) -> u64 {
        self.total_switches
    }

    /// Switches since the last drain (one auto-tune window)
    pub fn take_switches(&mut self) -> u64 {
        std::mem::take(&mut self.switches_since_drain)
    }
}

// =============================================================================
// Adaptive cache
// =============================================================================

/// Holds one instance of each algorithm and routes through the active one
pub struct AdaptiveCache {
    lru: LruCache,
    lfu: LfuCache,
    arc: ArcCache,
    active: Algorithm,
    selector: AdaptiveSelector,
    migration_limit: usize,
    clock: ClockRef,
}

impl AdaptiveCache {
    pub fn new(config: &CacheConfig, clock: ClockRef) -> Self {
        Self {
            lru: LruCache::new(config.max_size, config.default_ttl_ms, clock.clone())
                .with_memory_budget(config.memory_threshold, config.memory_budget_bytes),
            lfu: LfuCache::new(config.max_size, config.default_ttl_ms, clock.clone()),
            arc: ArcCache::new(config.max_size, config.default_ttl_ms, clock.clone()),
            active: Algorithm::Lru,
            selector: AdaptiveSelector::new(config.evaluation_window, config.switch_threshold),
            migration_limit: config.migration_limit,
            clock,
        }
    }

    pub fn active(&self) -> Algorithm {
        self.active
    }

    pub fn selector(&self) -> &AdaptiveSelector {
        &self.selector
    }

    pub fn set_switch_threshold(&mut self, threshold: f64) {
        self.selector.set_switch_threshold(threshold);
    }

    /// Switches since last asked (auto-tune window)
    pub fn take_switches(&mut self) -> u64 {
        self.selector.take_switches()
    }

    /// Look up through the active algorithm. The outcome is attributed to
    /// the algorithm that was active when the request arrived, before any
    /// switch this request may trigger.
    pub fn get(&mut self, key: &str) -> Option<Bytes> {
        let decided = self.active;
        let start = self.clock.now_ms();

        let result = match decided {
            Algorithm::Lru => self.lru.get(key),
            Algorithm::Lfu => self.lfu.get(key),
            Algorithm::Arc => self.arc.get(key),
        };

        let elapsed = self.clock.now_ms().saturating_sub(start) as f64;
        self.selector.record(decided, result.is_some(), elapsed);
        self.maybe_switch();
        result
    }

    /// Writes go to the active algorithm only
    pub fn set(&mut self, key: &str, value: Bytes, ttl_ms: Option<u64>) -> bool {
        match self.active {
            Algorithm::Lru => self.lru.set(key, value, ttl_ms),
            Algorithm::Lfu => self.lfu.set(key, value, ttl_ms),
            Algorithm::Arc => self.arc.set(key, value, ttl_ms),
        }
    }

    pub fn has(&mut self, key: &str) -> bool {
        match self.active {
            Algorithm::Lru => self.lru.has(key),
            Algorithm::Lfu => self.lfu.has(key),
            Algorithm::Arc => self.arc.has(key),
        }
    }

    pub fn delete(&mut self, key: &str) -> bool {
        match self.active {
            Algorithm::Lru => self.lru.delete(key),
            Algorithm::Lfu => self.lfu.delete(key),
            Algorithm::Arc => self.arc.delete(key),
        }
    }

    pub fn clear(&mut self) -> usize {
        match self.active {
            Algorithm::Lru => self.lru.clear(),
            Algorithm::Lfu => self.lfu.clear(),
            Algorithm::Arc => self.arc.clear(),
        }
    }

    /// Keys resident in the active algorithm
    pub fn keys(&self) -> Vec<String> {
        match self.active {
            Algorithm::Lru => self.lru.keys(),
            Algorithm::Lfu => self.lfu.keys(),
            Algorithm::Arc => self.arc.keys(),
        }
    }

    /// Resident entries in the active algorithm
    pub fn len(&self) -> usize {
        match self.active {
            Algorithm::Lru => self.lru.len(),
            Algorithm::Lfu => self.lfu.len(),
            Algorithm::Arc => self.arc.len(),
        }
    }

    /// Lifetime totals across all three instances
    pub fn stats(&self) -> StatsSnapshot {
        let mut snap = self.lru.stats();
        snap.merge(&self.lfu.stats());
        snap.merge(&self.arc.stats());
        snap
    }

    pub fn cleanup_expired(&mut self) -> usize {
        match self.active {
            Algorithm::Lru => self.lru.cleanup_expired().len(),
            Algorithm::Lfu => self.lfu.cleanup_expired().len(),
            Algorithm::Arc => self.arc.cleanup_expired().len(),
        }
    }

    pub fn optimize_memory(&mut self) -> usize {
        // only the LRU instance carries a byte watermark
        match self.active {
            Algorithm::Lru => self.lru.optimize_memory(),
            _ => 0,
        }
    }

    /// Switch the active algorithm, moving the most recent entries so the
    /// new instance does not start cold. The outgoing instance is emptied;
    /// entries past the migration limit are dropped rather than left behind
    /// to go stale.
    pub fn switch_to(&mut self, next: Algorithm) {
        if next == self.active {
            return;
        }

        let migrated = match self.active {
            Algorithm::Lru => self.lru.export_recent(self.migration_limit),
            Algorithm::Lfu => self.lfu.export_recent(self.migration_limit),
            Algorithm::Arc => self.arc.export_recent(self.migration_limit),
        };
        let count = migrated.len();
        let dropped = self.len().saturating_sub(count);

        match self.active {
            Algorithm::Lru => {
                self.lru.clear();
            }
            Algorithm::Lfu => {
                self.lfu.clear();
            }
            Algorithm::Arc => {
                self.arc.clear();
            }
        }

        for (key, entry) in migrated {
            self.import_entry(next, key, entry);
        }

        info!(
            from = %self.active,
            to = %next,
            migrated = count,
            dropped,
            "switched replacement algorithm"
        );
        self.active = next;
    }

    fn import_entry(&mut self, target: Algorithm, key: String, entry: CacheEntry) {
        match target {
            Algorithm::Lru => {
                self.lru.insert_entry(key, entry);
            }
            Algorithm::Lfu => self.lfu.insert_entry(key, entry),
            Algorithm::Arc => self.arc.insert_entry(key, entry),
        }
    }

    fn maybe_switch(&mut self) {
        if !self.selector.should_evaluate() {
            return;
        }
        if let Some(next) = self.selector.evaluate_and_switch(self.active) {
            self.switch_to(next);
        }
    }
}

impl fmt::Debug for AdaptiveCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveCache")
            .field("active", &self.active)
            .field("len", &self.len())
            .finish()
    }
}
