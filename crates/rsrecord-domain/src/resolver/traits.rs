//! Collaborators consulted by the resolver.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::DomainResult;
use crate::record::Record;

/// Local record cache together with its per-source tier policy.
#[async_trait]
pub trait RecordCache: Send + Sync {
    /// Whether `source` is looked up in the cache before the backend.
    fn is_primary(&self, source: &str) -> bool;

    /// Whether `source` is looked up in the cache after every other tier.
    fn is_fallback(&self, source: &str) -> bool;

    /// Looks up a single record. Absence is not an error.
    async fn lookup(&self, id: &str, source: &str) -> DomainResult<Vec<Record>>;

    /// Looks up several records of one source. May return only some of them.
    async fn lookup_batch(&self, ids: &[String], source: &str) -> DomainResult<Vec<Record>>;

    /// Scopes subsequent lookups to `context`.
    async fn set_context(&self, context: &str);
}

/// Remote search backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Retrieves a single record. An empty result means "not found"; an
    /// error means the backend itself failed.
    async fn retrieve(&self, source: &str, id: &str) -> DomainResult<Vec<Record>>;

    /// Retrieves several records of one source, in any order.
    async fn retrieve_batch(&self, source: &str, ids: &[String]) -> DomainResult<Vec<Record>>;
}

/// Per-source loader for ids nothing else can resolve.
///
/// A loader may return a record under a new canonical id; such records
/// report the requested id through [`Record::previous_unique_id`].
pub trait FallbackLoader: Send + Sync {
    /// Streams records for `ids` in any order.
    fn load<'a>(&'a self, ids: &'a [String]) -> BoxStream<'a, DomainResult<Record>>;
}

/// Fallback loaders keyed by source name.
#[derive(Clone, Default)]
pub struct FallbackRegistry {
    loaders: HashMap<String, Arc<dyn FallbackLoader>>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the loader for `source`.
    pub fn register(&mut self, source: impl Into<String>, loader: Arc<dyn FallbackLoader>) {
        self.loaders.insert(source.into(), loader);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_loader(mut self, source: impl Into<String>, loader: Arc<dyn FallbackLoader>) -> Self {
        self.register(source, loader);
        self
    }

    pub fn has(&self, source: &str) -> bool {
        self.loaders.contains_key(source)
    }

    pub fn get(&self, source: &str) -> Option<&Arc<dyn FallbackLoader>> {
        self.loaders.get(source)
    }
}

impl fmt::Debug for FallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sources: Vec<&String> = self.loaders.keys().collect();
        sources.sort();
        f.debug_struct("FallbackRegistry")
            .field("sources", &sources)
            .finish()
    }
}
