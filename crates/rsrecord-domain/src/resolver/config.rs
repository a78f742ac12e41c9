//! Configuration for the record resolver.

use std::time::Duration;

/// Configuration for the record resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Deadline for a whole `load` or `load_batch` call.
    pub timeout: Duration,
    /// Maximum number of sources resolved concurrently within one batch.
    ///
    /// Tiers within a source are always consulted in order; this only bounds
    /// how many sources are in flight at once. `1` resolves sources strictly
    /// one after another.
    pub max_concurrent_sources: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_concurrent_sources: 4,
        }
    }
}

impl ResolverConfig {
    /// Creates a new configuration with the specified timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Creates a new configuration with the specified source concurrency.
    ///
    /// Values below 1 are raised to 1.
    pub fn with_max_concurrent_sources(mut self, max_concurrent_sources: usize) -> Self {
        self.max_concurrent_sources = max_concurrent_sources.max(1);
        self
    }
}
