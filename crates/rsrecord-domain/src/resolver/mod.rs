//! Record resolver.
//!
//! Resolves `(source, id)` pairs through the record cache, the search
//! backend and per-source fallback loaders, and reassembles batch results
//! in the caller's order.

mod batch;
mod config;
mod metrics;
mod record_resolver;
mod traits;

#[cfg(test)]
mod tests;

pub use config::ResolverConfig;
pub use metrics::{ResolverMetrics, ResolverMetricsSnapshot, Tier};
pub use record_resolver::RecordResolver;
pub use traits::{FallbackLoader, FallbackRegistry, RecordCache, SearchBackend};
