//! Predictive cache warming
//!
//! The warmer turns analyzer predictions into loads through an injected
//! [`Loader`] and installs the results into the cache. Loader calls never
//! run under a cache lock: predictions are snapshotted first, the loads run
//! unlocked, and each result is installed through the target's own locking.
//!
//! A destroy signal aborts the cycle between loads; nothing is installed
//! once destruction begins.

use crate::analyzer::{AccessContext, PatternAnalyzer, Prediction};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// =============================================================================
// Ports
// =============================================================================

/// Source of values for warming. May be slow; may fail.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Load the value for a key. `Ok(None)` means the key does not exist.
    async fn load(&self, key: &str) -> Result<Option<Bytes>>;
}

/// Shared loader handle
pub type LoaderRef = Arc<dyn Loader>;

/// Cache surface the warmer installs into
pub trait WarmTarget: Send + Sync {
    fn contains(&self, key: &str) -> bool;
    fn install(&self, key: &str, value: Bytes, ttl_ms: Option<u64>) -> bool;
}

/// Loader that reads prompt content from a directory, read-only.
///
/// Keys map to file names under the root; anything that would escape the
/// root is rejected outright.
pub struct DirectoryLoader {
    root: std::path::PathBuf,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Loader for DirectoryLoader {
    async fn load(&self, key: &str) -> Result<Option<Bytes>> {
        if key.contains("..") || key.starts_with('/') || key.contains('\\') {
            return Err(Error::InvalidInput(format!("unsafe key path: {}", key)));
        }

        let path = self.root.join(key);
        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Some(Bytes::from(contents))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::LoaderFailure {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

// =============================================================================
// Reports and stats
// =============================================================================

/// Outcome of one warming cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmingReport {
    /// Keys loaded and installed
    pub warmed: usize,
    /// Predictions skipped (below confidence, or already cached)
    pub skipped: usize,
    /// Loader failures and absent keys
    pub errors: usize,
}

/// Lifetime warming counters
#[derive(Debug, Default)]
pub struct WarmerStats {
    pub cycles: AtomicU64,
    pub warmed: AtomicU64,
    pub skipped: AtomicU64,
    pub errors: AtomicU64,
}

impl WarmerStats {
    /// Fraction of attempted loads that succeeded
    pub fn success_rate(&self) -> f64 {
        let warmed = self.warmed.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let attempts = warmed + errors;
        if attempts == 0 {
            0.0
        } else {
            warmed as f64 / attempts as f64
        }
    }
}

// =============================================================================
// Warmer
// =============================================================================

/// Drives warming cycles from analyzer predictions
pub struct Warmer {
    loader: Option<LoaderRef>,
    min_confidence: Mutex<f64>,
    max_warm_items: usize,
    /// Contexts queued for the next periodic cycle
    contexts: Mutex<VecDeque<AccessContext>>,
    queue_max_size: usize,
    stats: WarmerStats,
    cancel: CancellationToken,
}

impl Warmer {
    pub fn new(
        loader: Option<LoaderRef>,
        min_confidence: f64,
        max_warm_items: usize,
        queue_max_size: usize,
    ) -> Self {
        Self {
            loader,
            min_confidence: Mutex::new(min_confidence),
            max_warm_items: max_warm_items.max(1),
            contexts: Mutex::new(VecDeque::new()),
            queue_max_size: queue_max_size.max(1),
            stats: WarmerStats::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn min_confidence(&self) -> f64 {
        *self.min_confidence.lock()
    }

    /// Adjust the confidence floor (used by auto-tuning)
    pub fn set_min_confidence(&self, confidence: f64) {
        *self.min_confidence.lock() = confidence.clamp(0.0, 1.0);
    }

    pub fn stats(&self) -> &WarmerStats {
        &self.stats
    }

    pub fn success_rate(&self) -> f64 {
        self.stats.success_rate()
    }

    /// Queue a context for the next periodic cycle. Deduplicates by user.
    pub fn note_context(&self, context: AccessContext) -> Result<()> {
        let mut queue = self.contexts.lock();
        if queue
            .iter()
            .any(|queued| queued.user_id == context.user_id)
        {
            return Ok(());
        }
        if queue.len() >= self.queue_max_size {
            return Err(Error::CapacityExceeded {
                capacity: self.queue_max_size,
            });
        }
        queue.push_back(context);
        Ok(())
    }

    /// Number of queued contexts
    pub fn pending_contexts(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Stop all warming. Idempotent; no value is installed afterwards.
    pub fn destroy(&self) {
        self.cancel.cancel();
    }

    pub fn is_destroyed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run one warming cycle for a context
    pub async fn perform_warming(
        &self,
        analyzer: &Mutex<PatternAnalyzer>,
        context: &AccessContext,
        target: &dyn WarmTarget,
    ) -> WarmingReport {
        // snapshot predictions under the analyzer lock, then release it
        let predictions: Vec<Prediction> = {
            let analyzer = analyzer.lock();
            analyzer.generate_predictions(context)
        };
        self.warm_predictions(predictions, target).await
    }

    /// Drain queued contexts and warm each one (the periodic timer path)
    pub async fn run_pending(
        &self,
        analyzer: &Mutex<PatternAnalyzer>,
        target: &dyn WarmTarget,
    ) -> WarmingReport {
        let drained: Vec<AccessContext> = {
            let mut queue = self.contexts.lock();
            queue.drain(..).collect()
        };

        let mut total = WarmingReport::default();
        for context in drained {
            if self.cancel.is_cancelled() {
                break;
            }
            let report = self.perform_warming(analyzer, &context, target).await;
            total.warmed += report.warmed;
            total.skipped += report.skipped;
            total.errors += report.errors;
        }
        total
    }

    async fn warm_predictions(
        &self,
        predictions: Vec<Prediction>,
        target: &dyn WarmTarget,
    ) -> WarmingReport {
        let mut report = WarmingReport::default();
        let Some(loader) = self.loader.as_ref() else {
            return report;
        };
        if self.cancel.is_cancelled() {
            return report;
        }

        let min_confidence = self.min_confidence();

        for prediction in predictions {
            if report.warmed >= self.max_warm_items || self.cancel.is_cancelled() {
                break;
            }
            if prediction.confidence < min_confidence {
                report.skipped += 1;
                continue;
            }
            if target.contains(&prediction.key) {
                report.skipped += 1;
                continue;
            }

            match loader.load(&prediction.key).await {
                Ok(Some(value)) => {
                    // a destroy that raced the load drops the result
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    if target.install(&prediction.key, value, None) {
                        report.warmed += 1;
                    } else {
                        report.errors += 1;
                    }
                }
                Ok(None) => {
                    report.errors += 1;
                }
                Err(e) => {
                    warn!(key = %prediction.key, error = %e, "loader failed during warming");
                    report.errors += 1;
                }
            }
        }

        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
        self.stats
            .warmed
            .fetch_add(report.warmed as u64, Ordering::Relaxed);
        self.stats
            .skipped
            .fetch_add(report.skipped as u64, Ordering::Relaxed);
        self.stats
            .errors
            .fetch_add(report.errors as u64, Ordering::Relaxed);

        debug!(
            warmed = report.warmed,
            skipped = report.skipped,
            errors = report.errors,
            "warming cycle finished"
        );
        report
    }
}

impl std::fmt::Debug for Warmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warmer")
            .field("loader", &self.loader.as_ref().map(|_| "<loader>"))
            .field("min_confidence", &self.min_confidence())
            .field("max_warm_items", &self.max_warm_items)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::lru::LruCache;
    use std::collections::HashSet;

    struct PrefixLoader;

    #[async_trait]
    impl Loader for PrefixLoader {
        async fn load(&self, key: &str) -> Result<Option<Bytes>> {
            if key.starts_with("loadable") {
                Ok(Some(Bytes::from(format!("loaded-{}", key))))
            } else {
                Ok(None)
            }
        }
    }

    struct FailingLoader;

    #[async_trait]
    impl Loader for FailingLoader {
        async fn load(&self, key: &str) -> Result<Option<Bytes>> {
            Err(Error::LoaderFailure {
                key: key.to_string(),
                reason: "backend down".into(),
            })
        }
    }

    struct TestTarget {
        cache: Mutex<LruCache>,
    }

    impl TestTarget {
        fn new() -> Self {
            Self {
                cache: Mutex::new(LruCache::new(
                    100,
                    60_000,
                    Arc::new(ManualClock::new()),
                )),
            }
        }
    }

    impl WarmTarget for TestTarget {
        fn contains(&self, key: &str) -> bool {
            self.cache.lock().has(key)
        }

        fn install(&self, key: &str, value: Bytes, ttl_ms: Option<u64>) -> bool {
            self.cache.lock().set(key, value, ttl_ms)
        }
    }

    fn analyzer_with(keys: &[&str], user: &str, accesses: usize) -> Mutex<PatternAnalyzer> {
        let mut analyzer = PatternAnalyzer::new(100, 10, 5, Arc::new(ManualClock::new()));
        let ctx = AccessContext::user(user);
        for _ in 0..accesses {
            for key in keys {
                analyzer.record_access(key, &ctx);
            }
        }
        // park the user off the candidate keys
        analyzer.record_access("somewhere-else", &ctx);
        Mutex::new(analyzer)
    }

    #[tokio::test]
    async fn test_warming_loads_and_installs() {
        let analyzer = analyzer_with(&["loadable-a", "loadable-b"], "u", 3);
        let warmer = Warmer::new(Some(Arc::new(PrefixLoader)), 0.3, 20, 100);
        let target = TestTarget::new();

        let report = warmer
            .perform_warming(&analyzer, &AccessContext::user("u"), &target)
            .await;

        assert_eq!(report.warmed, 2);
        assert_eq!(report.errors, 0);
        assert!(target.contains("loadable-a"));
        assert!(target.contains("loadable-b"));
        assert_eq!(
            target.cache.lock().get("loadable-a"),
            Some(Bytes::from("loaded-loadable-a"))
        );
    }

    #[tokio::test]
    async fn test_already_cached_keys_are_skipped() {
        let analyzer = analyzer_with(&["loadable-a", "loadable-b"], "u", 3);
        let warmer = Warmer::new(Some(Arc::new(PrefixLoader)), 0.3, 20, 100);
        let target = TestTarget::new();
        target.install("loadable-a", Bytes::from("already"), None);

        let report = warmer
            .perform_warming(&analyzer, &AccessContext::user("u"), &target)
            .await;

        assert_eq!(report.warmed, 1);
        assert!(report.skipped >= 1);
        // the cached value was not clobbered
        assert_eq!(
            target.cache.lock().get("loadable-a"),
            Some(Bytes::from("already"))
        );
    }

    #[tokio::test]
    async fn test_low_confidence_predictions_skipped() {
        // one access each: confidence 0.2 against a floor of 0.5
        let analyzer = analyzer_with(&["loadable-a"], "u", 1);
        let warmer = Warmer::new(Some(Arc::new(PrefixLoader)), 0.5, 20, 100);
        let target = TestTarget::new();

        let report = warmer
            .perform_warming(&analyzer, &AccessContext::user("u"), &target)
            .await;

        assert_eq!(report.warmed, 0);
        assert!(report.skipped >= 1);
        assert!(!target.contains("loadable-a"));
    }

    #[tokio::test]
    async fn test_loader_failures_counted_not_propagated() {
        let analyzer = analyzer_with(&["loadable-a"], "u", 3);
        let warmer = Warmer::new(Some(Arc::new(FailingLoader)), 0.3, 20, 100);
        let target = TestTarget::new();

        let report = warmer
            .perform_warming(&analyzer, &AccessContext::user("u"), &target)
            .await;

        assert_eq!(report.warmed, 0);
        assert!(report.errors >= 1);
        assert!(warmer.success_rate() < 1e-9);
    }

    #[tokio::test]
    async fn test_destroy_aborts_cycle() {
        let analyzer = analyzer_with(&["loadable-a", "loadable-b"], "u", 3);
        let warmer = Warmer::new(Some(Arc::new(PrefixLoader)), 0.3, 20, 100);
        let target = TestTarget::new();

        warmer.destroy();
        warmer.destroy(); // idempotent

        let report = warmer
            .perform_warming(&analyzer, &AccessContext::user("u"), &target)
            .await;

        assert_eq!(report, WarmingReport::default());
        assert!(!target.contains("loadable-a"));
    }

    #[tokio::test]
    async fn test_context_queue_bounds_and_dedup() {
        let warmer = Warmer::new(Some(Arc::new(PrefixLoader)), 0.3, 20, 2);

        warmer.note_context(AccessContext::user("a")).unwrap();
        warmer.note_context(AccessContext::user("a")).unwrap(); // dedup
        assert_eq!(warmer.pending_contexts(), 1);

        warmer.note_context(AccessContext::user("b")).unwrap();
        let err = warmer.note_context(AccessContext::user("c")).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { capacity: 2 }));
    }

    #[tokio::test]
    async fn test_run_pending_drains_queue() {
        let analyzer = analyzer_with(&["loadable-a"], "u", 3);
        let warmer = Warmer::new(Some(Arc::new(PrefixLoader)), 0.3, 20, 100);
        let target = TestTarget::new();

        warmer.note_context(AccessContext::user("u")).unwrap();
        let report = warmer.run_pending(&analyzer, &target).await;

        assert_eq!(report.warmed, 1);
        assert_eq!(warmer.pending_contexts(), 0);
    }

    #[tokio::test]
    async fn test_directory_loader_reads_and_rejects_escapes() {
        let root = std::env::temp_dir().join("prompt-cache-loader-test");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("greeting.txt"), b"Hello!").unwrap();

        let loader = DirectoryLoader::new(&root);
        assert_eq!(
            loader.load("greeting.txt").await.unwrap(),
            Some(Bytes::from_static(b"Hello!"))
        );
        assert_eq!(loader.load("absent.txt").await.unwrap(), None);
        assert!(loader.load("../etc/passwd").await.is_err());

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn test_max_warm_items_bounds_work() {
        let keys: Vec<String> = (0..6).map(|i| format!("loadable-{}", i)).collect();
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let analyzer = analyzer_with(&key_refs, "u", 3);
        let warmer = Warmer::new(Some(Arc::new(PrefixLoader)), 0.3, 2, 100);
        let target = TestTarget::new();

        let report = warmer
            .perform_warming(&analyzer, &AccessContext::user("u"), &target)
            .await;

        assert_eq!(report.warmed, 2);
        let installed: HashSet<String> = target
            .cache
            .lock()
            .keys()
            .into_iter()
            .collect();
        assert_eq!(installed.len(), 2);
    }
}
