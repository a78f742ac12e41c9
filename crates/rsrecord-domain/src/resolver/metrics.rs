//! Counters describing where records were resolved.

use std::sync::atomic::{AtomicU64, Ordering};

/// The lookup tiers, in the order a batch consults them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    CachePrimary,
    Backend,
    Fallback,
    CacheFallback,
}

impl Tier {
    /// Label used for the `tier` dimension of exported metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::CachePrimary => "cache_primary",
            Tier::Backend => "backend",
            Tier::Fallback => "fallback",
            Tier::CacheFallback => "cache_fallback",
        }
    }
}

/// Metrics for resolver monitoring.
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    pub cache_primary_hits: AtomicU64,
    pub backend_hits: AtomicU64,
    pub fallback_hits: AtomicU64,
    pub cache_fallback_hits: AtomicU64,
    /// Placeholders synthesized for unresolved requests.
    pub placeholders: AtomicU64,
    /// Backend errors downgraded to empty results.
    pub tolerated_backend_failures: AtomicU64,
    /// Resolved records that matched no unclaimed requested slot.
    pub dropped_records: AtomicU64,
}

impl ResolverMetrics {
    pub(crate) fn record_hits(&self, tier: Tier, count: usize) {
        if count == 0 {
            return;
        }
        let counter = match tier {
            Tier::CachePrimary => &self.cache_primary_hits,
            Tier::Backend => &self.backend_hits,
            Tier::Fallback => &self.fallback_hits,
            Tier::CacheFallback => &self.cache_fallback_hits,
        };
        counter.fetch_add(count as u64, Ordering::Relaxed);
        metrics::counter!("rsrecord_tier_hits_total", "tier" => tier.as_str())
            .increment(count as u64);
    }

    pub(crate) fn record_placeholder(&self) {
        self.placeholders.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("rsrecord_placeholders_total").increment(1);
    }

    pub(crate) fn record_tolerated_backend_failure(&self) {
        self.tolerated_backend_failures
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!("rsrecord_backend_failures_tolerated_total").increment(1);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped_records.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("rsrecord_records_dropped_total").increment(1);
    }

    /// Returns a snapshot of the current metrics.
    pub fn snapshot(&self) -> ResolverMetricsSnapshot {
        ResolverMetricsSnapshot {
            cache_primary_hits: self.cache_primary_hits.load(Ordering::Relaxed),
            backend_hits: self.backend_hits.load(Ordering::Relaxed),
            fallback_hits: self.fallback_hits.load(Ordering::Relaxed),
            cache_fallback_hits: self.cache_fallback_hits.load(Ordering::Relaxed),
            placeholders: self.placeholders.load(Ordering::Relaxed),
            tolerated_backend_failures: self.tolerated_backend_failures.load(Ordering::Relaxed),
            dropped_records: self.dropped_records.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of resolver metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverMetricsSnapshot {
    pub cache_primary_hits: u64,
    pub backend_hits: u64,
    pub fallback_hits: u64,
    pub cache_fallback_hits: u64,
    pub placeholders: u64,
    pub tolerated_backend_failures: u64,
    pub dropped_records: u64,
}

impl ResolverMetricsSnapshot {
    /// Total records resolved across all tiers.
    pub fn total_hits(&self) -> u64 {
        self.cache_primary_hits + self.backend_hits + self.fallback_hits + self.cache_fallback_hits
    }
}
