//! Tiered record resolution.
//!
//! # Tier Order
//!
//! For a single identifier:
//! 1. Cache, when the source is cache-primary
//! 2. Search backend
//! 3. Cache, when the source is cache-fallback
//!
//! For a batch of identifiers of one source, the fallback loader registered
//! for the source runs between the backend and the cache-fallback lookup.
//!
//! Each tier is only asked for ids no earlier tier satisfied, so every id is
//! looked up at most once per tier. Tiers depend on the ids left over by the
//! previous tier and are therefore always consulted sequentially.
//!
//! # Failure Policy
//!
//! Absence is never an error. Backend errors propagate unless the batch
//! caller asked for them to be tolerated, in which case they are logged and
//! the backend tier counts as empty. Cache and fallback loader errors always
//! propagate.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::error::{DomainError, DomainResult};
use crate::record::{ExtraFields, PlaceholderFactory, Record, RecordFactory};

use super::config::ResolverConfig;
use super::metrics::{ResolverMetrics, Tier};
use super::traits::{FallbackRegistry, RecordCache, SearchBackend};

/// Resolves `(source, id)` pairs into records.
///
/// The search backend is mandatory. The cache, fallback loaders and
/// placeholder factory are attached with the `with_*` builder methods.
pub struct RecordResolver<B> {
    pub(super) backend: Arc<B>,
    pub(super) cache: Option<Arc<dyn RecordCache>>,
    pub(super) fallbacks: FallbackRegistry,
    pub(super) factory: Arc<dyn RecordFactory>,
    pub(super) config: ResolverConfig,
    pub(super) metrics: ResolverMetrics,
}

impl<B> RecordResolver<B>
where
    B: SearchBackend + 'static,
{
    /// Creates a resolver backed only by the search backend.
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_config(backend, ResolverConfig::default())
    }

    /// Creates a resolver with custom configuration.
    pub fn with_config(backend: Arc<B>, config: ResolverConfig) -> Self {
        Self {
            backend,
            cache: None,
            fallbacks: FallbackRegistry::new(),
            factory: Arc::new(PlaceholderFactory),
            config,
            metrics: ResolverMetrics::default(),
        }
    }

    /// Attaches the record cache and its per-source policy.
    pub fn with_cache(mut self, cache: Arc<dyn RecordCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attaches the per-source fallback loaders.
    pub fn with_fallbacks(mut self, fallbacks: FallbackRegistry) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Replaces the factory used to build placeholder records.
    pub fn with_factory(mut self, factory: Arc<dyn RecordFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the resolver metrics for monitoring.
    pub fn metrics(&self) -> &ResolverMetrics {
        &self.metrics
    }

    /// Forwards a context string to the cache to scope subsequent lookups.
    ///
    /// Does nothing when no cache is attached.
    pub async fn set_cache_context(&self, context: &str) {
        if let Some(cache) = &self.cache {
            cache.set_context(context).await;
        }
    }

    /// Loads a single record.
    ///
    /// The first tier that returns anything wins. When no tier matches, a
    /// placeholder is returned if `tolerate_missing` is set, otherwise
    /// [`DomainError::RecordNotFound`]. Backend errors always propagate here.
    pub async fn load(&self, id: &str, source: &str, tolerate_missing: bool) -> DomainResult<Record> {
        let found = match timeout(self.config.timeout, self.resolve_single(id, source)).await {
            Ok(result) => result?,
            Err(_) => return Err(self.timeout_error()),
        };

        match found {
            Some(record) => Ok(record),
            None if tolerate_missing => {
                debug!(source = %source, id = %id, "No tier resolved record, returning placeholder");
                self.metrics.record_placeholder();
                Ok(self.factory.missing(source, id, &ExtraFields::new()))
            }
            None => Err(DomainError::RecordNotFound {
                source_name: source.to_string(),
                id: id.to_string(),
            }),
        }
    }

    async fn resolve_single(&self, id: &str, source: &str) -> DomainResult<Option<Record>> {
        if id.is_empty() {
            return Ok(None);
        }

        if let Some(cache) = self.cache_where(source, |c, s| c.is_primary(s)) {
            if let Some(record) = cache.lookup(id, source).await?.into_iter().next() {
                self.metrics.record_hits(Tier::CachePrimary, 1);
                return Ok(Some(record));
            }
        }

        let retrieved = self
            .backend
            .retrieve(source, id)
            .await
            .map_err(|e| backend_failure(source, e))?;
        if let Some(record) = retrieved.into_iter().next() {
            self.metrics.record_hits(Tier::Backend, 1);
            return Ok(Some(record));
        }

        if let Some(cache) = self.cache_where(source, |c, s| c.is_fallback(s)) {
            if let Some(record) = cache.lookup(id, source).await?.into_iter().next() {
                self.metrics.record_hits(Tier::CacheFallback, 1);
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    /// Resolves a set of ids that all belong to `source`.
    ///
    /// Returns every record found, in tier order: cache-primary hits, backend
    /// hits, fallback loader hits, cache-fallback hits. Ids nobody resolved
    /// are simply absent from the result.
    ///
    /// With `tolerate_backend_errors` set, a backend error is logged and the
    /// later tiers still run; otherwise it aborts resolution of this source.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn resolve_source_batch(
        &self,
        ids: &[String],
        source: &str,
        tolerate_backend_errors: bool,
    ) -> DomainResult<Vec<Record>> {
        let mut pending = PendingIds::new(ids);
        let mut results = Vec::new();

        if let Some(cache) = self.cache_where(source, |c, s| c.is_primary(s)) {
            let records = cache.lookup_batch(pending.as_slice(), source).await?;
            self.accept(Tier::CachePrimary, records, &mut pending, &mut results);
        }

        if !pending.is_empty() {
            let records = match self.backend.retrieve_batch(source, pending.as_slice()).await {
                Ok(records) => records,
                Err(e) if tolerate_backend_errors => {
                    warn!(
                        source = %source,
                        pending = pending.len(),
                        error = %e,
                        "Backend retrieve failed, continuing with remaining tiers"
                    );
                    self.metrics.record_tolerated_backend_failure();
                    Vec::new()
                }
                Err(e) => return Err(backend_failure(source, e)),
            };
            self.accept(Tier::Backend, records, &mut pending, &mut results);
        }

        if !pending.is_empty() {
            if let Some(loader) = self.fallbacks.get(source) {
                let requested = pending.to_vec();
                let mut stream = loader.load(&requested);
                let mut hits = 0;
                while let Some(item) = stream.next().await {
                    let record = item?;
                    pending.satisfy(record.unique_id());
                    if let Some(previous) = record.previous_unique_id() {
                        pending.satisfy(previous);
                    }
                    results.push(record);
                    hits += 1;
                }
                pending.compact();
                self.metrics.record_hits(Tier::Fallback, hits);
            }
        }

        if !pending.is_empty() {
            if let Some(cache) = self.cache_where(source, |c, s| c.is_fallback(s)) {
                let records = cache.lookup_batch(pending.as_slice(), source).await?;
                self.accept(Tier::CacheFallback, records, &mut pending, &mut results);
            }
        }

        debug!(
            source = %source,
            resolved = results.len(),
            unresolved = pending.len(),
            "Resolved source batch"
        );

        Ok(results)
    }

    /// Returns the cache if one is attached and `policy` selects `source`.
    fn cache_where(
        &self,
        source: &str,
        policy: impl Fn(&dyn RecordCache, &str) -> bool,
    ) -> Option<&Arc<dyn RecordCache>> {
        match &self.cache {
            Some(cache) if policy(cache.as_ref(), source) => Some(cache),
            _ => None,
        }
    }

    fn accept(
        &self,
        tier: Tier,
        records: Vec<Record>,
        pending: &mut PendingIds,
        results: &mut Vec<Record>,
    ) {
        self.metrics.record_hits(tier, records.len());
        for record in records {
            pending.satisfy(record.unique_id());
            results.push(record);
        }
        pending.compact();
    }

    pub(super) fn timeout_error(&self) -> DomainError {
        DomainError::Timeout {
            duration_ms: self.config.timeout.as_millis() as u64,
        }
    }
}

/// Normalizes any backend error into a `BackendFailure` for `source`.
fn backend_failure(source: &str, error: DomainError) -> DomainError {
    match error {
        DomainError::BackendFailure { .. } => error,
        other => DomainError::BackendFailure {
            source_name: source.to_string(),
            message: other.to_string(),
        },
    }
}

/// Ids of one source not yet satisfied by any tier, in request order.
///
/// `satisfy` only updates the set; `ids` is brought back in line by
/// `compact` once per tier, before it is handed to the next tier.
#[derive(Debug)]
struct PendingIds {
    ids: Vec<String>,
    remaining: HashSet<String>,
}

impl PendingIds {
    fn new(ids: &[String]) -> Self {
        let mut remaining = HashSet::with_capacity(ids.len());
        let ids = ids
            .iter()
            .filter(|id| remaining.insert((*id).clone()))
            .cloned()
            .collect();
        Self { ids, remaining }
    }

    fn satisfy(&mut self, id: &str) {
        self.remaining.remove(id);
    }

    fn compact(&mut self) {
        if self.ids.len() != self.remaining.len() {
            let remaining = &self.remaining;
            self.ids.retain(|id| remaining.contains(id));
        }
    }

    fn as_slice(&self) -> &[String] {
        &self.ids
    }

    fn to_vec(&self) -> Vec<String> {
        self.ids.clone()
    }

    fn len(&self) -> usize {
        self.remaining.len()
    }

    fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}
