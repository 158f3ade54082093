//! Partition registry
//!
//! Named cache partitions, each with its own configuration template and
//! statistics. The service keeps one partition per concern: prompt file
//! contents, metadata, search results, rendered templates. Partitions are
//! instantiated lazily on first use.
//!
//! Sizing honors environment knobs so deployments can resize partitions
//! without a rebuild.

use crate::config::CacheConfig;
use crate::stats::StatsSnapshot;
use crate::system::{CacheSystem, SystemStats};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Prompt file contents
pub const PARTITION_HOT_PROMPTS: &str = "hot_prompts";
/// Prompt metadata (tags, versions, timestamps)
pub const PARTITION_METADATA: &str = "metadata";
/// Search result sets
pub const PARTITION_SEARCH_RESULTS: &str = "search_results";
/// Rendered prompt templates
pub const PARTITION_TEMPLATES: &str = "templates";

/// Aggregated statistics across all partitions
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub partitions: BTreeMap<String, SystemStats>,
    pub totals: StatsSnapshot,
}

/// Catalogue of named cache partitions
pub struct CacheRegistry {
    partitions: DashMap<String, Arc<CacheSystem>>,
    templates: DashMap<String, CacheConfig>,
    default_config: CacheConfig,
}

impl CacheRegistry {
    /// Registry with the built-in partition templates
    pub fn new() -> Self {
        Self::with_defaults(CacheConfig::default())
    }

    /// Registry whose built-in templates inherit from `default_config`
    /// (clock, loader, and compressor carry over into every partition)
    pub fn with_defaults(default_config: CacheConfig) -> Self {
        let templates = DashMap::new();
        for (name, config) in builtin_templates(&default_config) {
            templates.insert(name, config);
        }
        Self {
            partitions: DashMap::new(),
            templates,
            default_config,
        }
    }

    /// Register or replace a partition template. Affects partitions
    /// instantiated after this call.
    pub fn register_template(&self, name: impl Into<String>, config: CacheConfig) {
        self.templates.insert(name.into(), config);
    }

    /// Fetch a partition, instantiating it from its template (or the
    /// default configuration) if absent
    pub fn partition(&self, name: &str) -> Arc<CacheSystem> {
        self.partitions
            .entry(name.to_string())
            .or_insert_with(|| {
                let config = self
                    .templates
                    .get(name)
                    .map(|template| template.value().clone())
                    .unwrap_or_else(|| self.default_config.clone());
                info!(partition = name, "instantiating cache partition");
                CacheSystem::new(config)
            })
            .clone()
    }

    /// Names of instantiated partitions
    pub fn partition_names(&self) -> Vec<String> {
        self.partitions.iter().map(|p| p.key().clone()).collect()
    }

    /// Number of instantiated partitions
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Stats per partition plus a merged total
    pub fn aggregate_stats(&self) -> RegistryStats {
        let mut partitions = BTreeMap::new();
        let mut totals = StatsSnapshot::default();

        for entry in self.partitions.iter() {
            let stats = entry.value().system_stats();
            totals.merge(&stats.cache);
            partitions.insert(entry.key().clone(), stats);
        }

        RegistryStats { partitions, totals }
    }

    /// Destroy and drop one partition
    pub fn remove(&self, name: &str) -> bool {
        match self.partitions.remove(name) {
            Some((_, system)) => {
                system.destroy();
                true
            }
            None => false,
        }
    }

    /// Destroy every partition. The registry stays usable; partitions are
    /// re-instantiated on next use.
    pub fn destroy_all(&self) {
        for entry in self.partitions.iter() {
            entry.value().destroy();
        }
        self.partitions.clear();
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("partitions", &self.partitions.len())
            .field("templates", &self.templates.len())
            .finish()
    }
}

/// Built-in partition templates, sized from the environment
fn builtin_templates(base: &CacheConfig) -> Vec<(String, CacheConfig)> {
    let mut hot_prompts = base.clone();
    hot_prompts.max_size = env_usize("FILE_CACHE_MAX_SIZE", 500);
    hot_prompts.default_ttl_ms = env_u64("FILE_CACHE_TTL", 600_000);

    let mut metadata = base.clone();
    metadata.max_size = env_usize("METADATA_CACHE_MAX_SIZE", 1000);
    metadata.default_ttl_ms = env_u64("METADATA_CACHE_TTL", 300_000);

    let mut search_results = base.clone();
    search_results.max_size = env_usize("SEARCH_CACHE_MAX_SIZE", 200);
    search_results.default_ttl_ms = env_u64("SEARCH_CACHE_TTL", 180_000);

    let mut templates = base.clone();
    templates.max_size = env_usize("TEMPLATE_CACHE_MAX_SIZE", 100);
    templates.default_ttl_ms = env_u64("TEMPLATE_CACHE_TTL", 900_000);

    vec![
        (PARTITION_HOT_PROMPTS.to_string(), hot_prompts),
        (PARTITION_METADATA.to_string(), metadata),
        (PARTITION_SEARCH_RESULTS.to_string(), search_results),
        (PARTITION_TEMPLATES.to_string(), templates),
    ]
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_lazy_instantiation() {
        let registry = CacheRegistry::new();
        assert!(registry.is_empty());

        let partition = registry.partition(PARTITION_METADATA);
        assert_eq!(registry.len(), 1);

        // same instance comes back
        let again = registry.partition(PARTITION_METADATA);
        assert!(Arc::ptr_eq(&partition, &again));
    }

    #[test]
    fn test_unknown_partition_uses_defaults() {
        let registry = CacheRegistry::new();
        let partition = registry.partition("scratch");

        partition
            .set("k", Bytes::from("v"), None, None)
            .unwrap();
        assert_eq!(partition.get("k", None), Some(Bytes::from("v")));
    }

    #[test]
    fn test_partitions_are_isolated() {
        let registry = CacheRegistry::new();
        let files = registry.partition(PARTITION_HOT_PROMPTS);
        let search = registry.partition(PARTITION_SEARCH_RESULTS);

        files.set("k", Bytes::from("file"), None, None).unwrap();
        assert_eq!(search.get("k", None), None);
        assert_eq!(files.get("k", None), Some(Bytes::from("file")));
    }

    #[test]
    fn test_aggregate_stats_merge() {
        let registry = CacheRegistry::new();
        let a = registry.partition(PARTITION_HOT_PROMPTS);
        let b = registry.partition(PARTITION_METADATA);

        a.set("k", Bytes::from("v"), None, None).unwrap();
        a.get("k", None);
        b.get("missing", None);

        let stats = registry.aggregate_stats();
        assert_eq!(stats.partitions.len(), 2);
        assert_eq!(stats.totals.hits, 1);
        assert_eq!(stats.totals.misses, 1);
    }

    #[test]
    fn test_custom_template() {
        let registry = CacheRegistry::new();
        registry.register_template(
            "tiny",
            CacheConfig::default().max_size(2),
        );

        let tiny = registry.partition("tiny");
        tiny.set("a", Bytes::from("1"), None, None).unwrap();
        tiny.set("b", Bytes::from("2"), None, None).unwrap();
        tiny.set("c", Bytes::from("3"), None, None).unwrap();
        assert_eq!(tiny.len(), 2);
    }

    #[test]
    fn test_env_knob_parsing() {
        std::env::set_var("PROMPT_CACHE_TEST_KNOB", "123");
        assert_eq!(env_usize("PROMPT_CACHE_TEST_KNOB", 7), 123);
        assert_eq!(env_usize("PROMPT_CACHE_TEST_KNOB_ABSENT", 7), 7);

        std::env::set_var("PROMPT_CACHE_TEST_BAD", "not-a-number");
        assert_eq!(env_u64("PROMPT_CACHE_TEST_BAD", 9), 9);
    }

    #[test]
    fn test_destroy_all_allows_reinstantiation() {
        let registry = CacheRegistry::new();
        let partition = registry.partition(PARTITION_TEMPLATES);
        partition.set("k", Bytes::from("v"), None, None).unwrap();

        registry.destroy_all();
        assert!(registry.is_empty());
        assert!(partition.is_destroyed());

        let fresh = registry.partition(PARTITION_TEMPLATES);
        assert!(!fresh.is_destroyed());
        assert_eq!(fresh.get("k", None), None);
    }

    #[test]
    fn test_remove_partition() {
        let registry = CacheRegistry::new();
        registry.partition("scratch");

        assert!(registry.remove("scratch"));
        assert!(!registry.remove("scratch"));
        assert!(registry.is_empty());
    }
}
