//! In-memory record cache with per-source tier policy.
//!
//! This module provides [`MemoryRecordCache`], a [`RecordCache`] backed by
//! Moka's async cache with TTL-based eviction.
//!
//! # Tier Policy
//!
//! Each source is configured as cache-primary (consulted before the search
//! backend), cache-fallback (consulted after every other tier) or neither.
//! Sources not listed are never looked up in the cache.
//!
//! # Context Scoping
//!
//! Entries are keyed by `(context, source, id)`. [`RecordCache::set_context`]
//! switches the context used by every subsequent lookup and insert, so the
//! same id can be cached independently per context (for example per
//! user list or per tenant). The initial context is empty.
//!
//! # Example
//!
//! ```rust,ignore
//! use rsrecord_domain::cache::{MemoryRecordCache, RecordCacheConfig};
//! use rsrecord_domain::Record;
//!
//! let config = RecordCacheConfig::default().with_primary_source("solr");
//! let cache = MemoryRecordCache::new(config);
//!
//! cache.insert(Record::new("solr", "1")).await;
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;
use moka::notification::RemovalCause;
use tokio::sync::RwLock;

use crate::error::DomainResult;
use crate::record::Record;
use crate::resolver::RecordCache;

/// Configuration for the record cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,
    /// TTL for cache entries.
    pub default_ttl: Duration,
    /// Sources looked up in the cache before the backend.
    pub primary_sources: HashSet<String>,
    /// Sources looked up in the cache after every other tier.
    pub fallback_sources: HashSet<String>,
}

impl Default for RecordCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
            default_ttl: Duration::from_secs(300),
            primary_sources: HashSet::new(),
            fallback_sources: HashSet::new(),
        }
    }
}

impl RecordCacheConfig {
    /// Sets the maximum capacity.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Sets the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Marks a source as cache-primary.
    pub fn with_primary_source(mut self, source: impl Into<String>) -> Self {
        self.primary_sources.insert(source.into());
        self
    }

    /// Marks a source as cache-fallback.
    pub fn with_fallback_source(mut self, source: impl Into<String>) -> Self {
        self.fallback_sources.insert(source.into());
        self
    }
}

/// Cache key for one record within one context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub context: String,
    pub source: String,
    pub id: String,
}

impl CacheKey {
    /// Creates a new cache key.
    pub fn new(
        context: impl Into<String>,
        source: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            source: source.into(),
            id: id.into(),
        }
    }
}

/// Source -> cache keys, for source-wide invalidation.
type SourceIndex = DashMap<String, HashSet<CacheKey>>;

/// Drops `key` from the index, and its source once no keys remain.
fn unindex(index: &SourceIndex, key: &CacheKey) {
    if let Some(mut keys) = index.get_mut(&key.source) {
        keys.remove(key);
    }
    index.remove_if(&key.source, |_, keys| keys.is_empty());
}

/// In-memory [`RecordCache`] implementation.
///
/// # Thread Safety
///
/// Fully thread-safe; share it behind an `Arc` across tasks.
pub struct MemoryRecordCache {
    cache: Cache<CacheKey, Record>,
    config: RecordCacheConfig,
    context: RwLock<String>,
    /// Secondary index of live keys. Expired and evicted keys leave it
    /// through the eviction listener.
    by_source: Arc<SourceIndex>,
}

impl std::fmt::Debug for MemoryRecordCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRecordCache")
            .field("config", &self.config)
            .field("entry_count", &self.cache.entry_count())
            .field("source_index_size", &self.by_source.len())
            .finish()
    }
}

impl MemoryRecordCache {
    /// Creates a new record cache with the given configuration.
    pub fn new(config: RecordCacheConfig) -> Self {
        let by_source: Arc<SourceIndex> = Arc::new(DashMap::new());
        let index = Arc::clone(&by_source);

        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.default_ttl)
            .eviction_listener(move |key: Arc<CacheKey>, _: Record, cause| {
                // A replaced key is still live under its new value.
                if cause != RemovalCause::Replaced {
                    unindex(&index, &key);
                }
            })
            .build();

        Self {
            cache,
            config,
            context: RwLock::new(String::new()),
            by_source,
        }
    }

    /// Returns the configuration for this cache.
    pub fn config(&self) -> &RecordCacheConfig {
        &self.config
    }

    /// Returns the context subsequent lookups are scoped to.
    pub async fn context(&self) -> String {
        self.context.read().await.clone()
    }

    async fn key(&self, source: &str, id: &str) -> CacheKey {
        CacheKey::new(self.context.read().await.as_str(), source, id)
    }

    /// Stores a record under the current context, keyed by its own unique id.
    pub async fn insert(&self, record: Record) {
        let key = self
            .key(record.source_identifier(), record.unique_id())
            .await;

        // Index after inserting: overwriting an expired entry notifies the
        // listener, which would otherwise unindex the fresh key.
        self.cache.insert(key.clone(), record).await;

        self.by_source
            .entry(key.source.clone())
            .or_default()
            .insert(key.clone());

        // Admission may reject the entry before it was indexed.
        if !self.cache.contains_key(&key) {
            unindex(&self.by_source, &key);
        }
    }

    /// Removes a single record from the current context.
    pub async fn invalidate(&self, source: &str, id: &str) {
        let key = self.key(source, id).await;
        unindex(&self.by_source, &key);
        self.cache.invalidate(&key).await;
    }

    /// Removes every record of `source`, in every context.
    pub async fn invalidate_source(&self, source: &str) {
        if let Some((_, keys)) = self.by_source.remove(source) {
            for key in &keys {
                self.cache.invalidate(key).await;
            }
        }
    }

    /// Returns the approximate number of entries in the cache.
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    async fn get(&self, key: &CacheKey) -> Option<Record> {
        let result = self.cache.get(key).await;
        if result.is_some() {
            metrics::counter!("rsrecord_cache_hits_total").increment(1);
        } else {
            metrics::counter!("rsrecord_cache_misses_total").increment(1);
        }
        result
    }
}

#[async_trait]
impl RecordCache for MemoryRecordCache {
    fn is_primary(&self, source: &str) -> bool {
        self.config.primary_sources.contains(source)
    }

    fn is_fallback(&self, source: &str) -> bool {
        self.config.fallback_sources.contains(source)
    }

    async fn lookup(&self, id: &str, source: &str) -> DomainResult<Vec<Record>> {
        let key = self.key(source, id).await;
        Ok(self.get(&key).await.into_iter().collect())
    }

    async fn lookup_batch(&self, ids: &[String], source: &str) -> DomainResult<Vec<Record>> {
        let context = self.context().await;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let key = CacheKey::new(context.as_str(), source, id.as_str());
            if let Some(record) = self.get(&key).await {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn set_context(&self, context: &str) {
        *self.context.write().await = context.to_string();
    }
}
