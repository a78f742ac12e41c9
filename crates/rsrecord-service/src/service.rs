//! Record loading service.
//!
//! Wraps a [`RecordResolver`] with request validation and builds it from a
//! [`ServiceConfig`].

use std::sync::Arc;

use rsrecord_domain::error::DomainError;
use rsrecord_domain::{
    FallbackRegistry, IdentifierSpec, MemoryRecordCache, Record, RecordResolver, SearchBackend,
};
use tracing::info;

use crate::config::ServiceConfig;

/// Errors returned by the record service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordServiceError {
    /// The batch request exceeds the maximum allowed size.
    #[error("batch size {size} exceeds maximum allowed {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// Domain error during resolution.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Result type for record service operations.
pub type RecordServiceResult<T> = Result<T, RecordServiceError>;

/// Front door for record loading.
pub struct RecordService<B> {
    resolver: Arc<RecordResolver<B>>,
    cache: Option<Arc<MemoryRecordCache>>,
    max_batch_size: usize,
}

impl<B> RecordService<B>
where
    B: SearchBackend + 'static,
{
    /// Creates a service around an existing resolver.
    pub fn new(resolver: Arc<RecordResolver<B>>, max_batch_size: usize) -> Self {
        Self {
            resolver,
            cache: None,
            max_batch_size,
        }
    }

    /// Builds the resolver, and the record cache when enabled, from configuration.
    pub fn from_config(
        config: &ServiceConfig,
        backend: Arc<B>,
        fallbacks: FallbackRegistry,
    ) -> Self {
        let mut resolver =
            RecordResolver::with_config(backend, config.resolver_config()).with_fallbacks(fallbacks);

        let cache = config.cache_config().map(|cache_config| {
            info!(
                primary_sources = ?cache_config.primary_sources,
                fallback_sources = ?cache_config.fallback_sources,
                ttl_secs = cache_config.default_ttl.as_secs(),
                "Record cache enabled"
            );
            Arc::new(MemoryRecordCache::new(cache_config))
        });
        if let Some(cache) = &cache {
            resolver = resolver.with_cache(cache.clone());
        }

        Self {
            resolver: Arc::new(resolver),
            cache,
            max_batch_size: config.resolver.max_batch_size,
        }
    }

    pub fn resolver(&self) -> &Arc<RecordResolver<B>> {
        &self.resolver
    }

    /// The record cache built from configuration, if enabled.
    pub fn cache(&self) -> Option<&Arc<MemoryRecordCache>> {
        self.cache.as_ref()
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Loads a single record.
    pub async fn load(
        &self,
        source: &str,
        id: &str,
        tolerate_missing: bool,
    ) -> RecordServiceResult<Record> {
        Ok(self.resolver.load(id, source, tolerate_missing).await?)
    }

    /// Validates a batch request size.
    pub fn validate(&self, size: usize) -> RecordServiceResult<()> {
        if size > self.max_batch_size {
            return Err(RecordServiceError::BatchTooLarge {
                size,
                max: self.max_batch_size,
            });
        }
        Ok(())
    }

    /// Loads a batch of records, one per request entry, in request order.
    pub async fn load_batch(
        &self,
        specs: Vec<IdentifierSpec>,
        tolerate_backend_errors: bool,
    ) -> RecordServiceResult<Vec<Record>> {
        self.validate(specs.len())?;
        Ok(self
            .resolver
            .load_batch(specs, tolerate_backend_errors)
            .await?)
    }

    /// Scopes subsequent cache lookups to `context`.
    pub async fn set_cache_context(&self, context: &str) {
        self.resolver.set_cache_context(context).await;
    }
}
