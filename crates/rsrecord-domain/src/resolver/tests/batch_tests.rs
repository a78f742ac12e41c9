//! Tests for per-source batch resolution and batch reconciliation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::mocks::*;
use crate::error::DomainError;
use crate::identifier::IdentifierSpec;
use crate::record::{ExtraFields, Record};
use crate::resolver::{FallbackRegistry, ResolverConfig};

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn summary(records: &[Record]) -> Vec<(String, String, Option<String>)> {
    records
        .iter()
        .map(|r| {
            (
                r.source_identifier().to_string(),
                r.unique_id().to_string(),
                if r.is_missing() {
                    Some("missing".to_string())
                } else {
                    origin(r).map(str::to_string)
                },
            )
        })
        .collect()
}

fn row(source: &str, id: &str, origin: &str) -> (String, String, Option<String>) {
    (source.to_string(), id.to_string(), Some(origin.to_string()))
}

// ============================================================
// Section 1: Per-Source Tier Bookkeeping
// ============================================================

#[tokio::test]
async fn test_backend_is_not_asked_for_primary_cache_hits() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.add("solr", "1").await;
    backend.add("solr", "2").await;
    let cache = Arc::new(MockRecordCache::new().primary_for("solr"));
    cache.add("solr", "1").await;
    let resolver = create_resolver(backend.clone(), Some(cache), FallbackRegistry::new());

    // Act
    let records = resolver
        .resolve_source_batch(&ids(&["1", "2"]), "solr", false)
        .await
        .unwrap();

    // Assert
    assert_eq!(
        summary(&records),
        vec![row("solr", "1", "cache"), row("solr", "2", "backend")]
    );
    assert_eq!(
        backend.retrieve_calls(),
        vec![("solr".to_string(), ids(&["2"]))]
    );
}

#[tokio::test]
async fn test_backend_is_skipped_when_cache_satisfies_everything() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    let cache = Arc::new(MockRecordCache::new().primary_for("solr"));
    cache.add("solr", "1").await;
    cache.add("solr", "2").await;
    let resolver = create_resolver(backend.clone(), Some(cache), FallbackRegistry::new());

    // Act
    let records = resolver
        .resolve_source_batch(&ids(&["1", "2"]), "solr", false)
        .await
        .unwrap();

    // Assert
    assert_eq!(records.len(), 2);
    assert!(backend.retrieve_calls().is_empty());
}

#[tokio::test]
async fn test_fallback_loader_only_receives_unresolved_ids() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.add("solr", "1").await;
    let loader = Arc::new(MockFallbackLoader::new().with("solr", "2"));
    let fallbacks = FallbackRegistry::new().with_loader("solr", loader.clone());
    let resolver = create_resolver(backend, None, fallbacks);

    // Act
    let records = resolver
        .resolve_source_batch(&ids(&["1", "2", "3"]), "solr", false)
        .await
        .unwrap();

    // Assert
    assert_eq!(loader.load_calls(), vec![ids(&["2", "3"])]);
    assert_eq!(
        summary(&records),
        vec![row("solr", "1", "backend"), row("solr", "2", "fallback")]
    );
}

#[tokio::test]
async fn test_renamed_fallback_record_satisfies_previous_id() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    let loader = Arc::new(MockFallbackLoader::new().with_renamed("solr", "old", "new"));
    let cache = Arc::new(MockRecordCache::new().fallback_for("solr"));
    let fallbacks = FallbackRegistry::new().with_loader("solr", loader);
    let resolver = create_resolver(backend, Some(cache.clone()), fallbacks);

    // Act
    let records = resolver
        .resolve_source_batch(&ids(&["old"]), "solr", false)
        .await
        .unwrap();

    // Assert
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].unique_id(), "new");
    assert_eq!(records[0].previous_unique_id(), Some("old"));
    // "old" was satisfied, so the fallback cache is never consulted.
    assert!(cache.lookup_calls().is_empty());
}

#[tokio::test]
async fn test_fallback_cache_receives_only_leftover_ids() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.add("summon", "a").await;
    let loader = Arc::new(MockFallbackLoader::new().with("summon", "b"));
    let cache = Arc::new(MockRecordCache::new().fallback_for("summon"));
    cache.add("summon", "c").await;
    let fallbacks = FallbackRegistry::new().with_loader("summon", loader);
    let resolver = create_resolver(backend, Some(cache.clone()), fallbacks);

    // Act
    let records = resolver
        .resolve_source_batch(&ids(&["a", "b", "c", "d"]), "summon", false)
        .await
        .unwrap();

    // Assert
    assert_eq!(
        summary(&records),
        vec![
            row("summon", "a", "backend"),
            row("summon", "b", "fallback"),
            row("summon", "c", "cache"),
        ]
    );
    assert_eq!(
        cache.lookup_calls(),
        vec![("summon".to_string(), ids(&["c", "d"]))]
    );
    let metrics = resolver.metrics().snapshot();
    assert_eq!(metrics.backend_hits, 1);
    assert_eq!(metrics.fallback_hits, 1);
    assert_eq!(metrics.cache_fallback_hits, 1);
    assert_eq!(metrics.total_hits(), 3);
}

#[tokio::test]
async fn test_backend_failure_propagates_without_tolerance() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.fail_source("solr").await;
    let loader = Arc::new(MockFallbackLoader::new().with("solr", "1"));
    let fallbacks = FallbackRegistry::new().with_loader("solr", loader.clone());
    let resolver = create_resolver(backend, None, fallbacks);

    // Act
    let result = resolver
        .resolve_source_batch(&ids(&["1"]), "solr", false)
        .await;

    // Assert
    assert!(matches!(result, Err(DomainError::BackendFailure { .. })));
    assert!(loader.load_calls().is_empty());
}

#[tokio::test]
async fn test_tolerated_backend_failure_still_runs_later_tiers() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.add("solr", "2").await;
    backend.fail_source("solr").await;
    let loader = Arc::new(MockFallbackLoader::new().with("solr", "1"));
    let cache = Arc::new(MockRecordCache::new().fallback_for("solr"));
    cache.add("solr", "2").await;
    let fallbacks = FallbackRegistry::new().with_loader("solr", loader);
    let resolver = create_resolver(backend, Some(cache), fallbacks);

    // Act
    let records = resolver
        .resolve_source_batch(&ids(&["1", "2"]), "solr", true)
        .await
        .unwrap();

    // Assert
    assert_eq!(
        summary(&records),
        vec![row("solr", "1", "fallback"), row("solr", "2", "cache")]
    );
    assert_eq!(resolver.metrics().snapshot().tolerated_backend_failures, 1);
}

#[tokio::test]
async fn test_fallback_loader_failure_propagates() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    let loader = Arc::new(MockFallbackLoader::new().failing());
    let fallbacks = FallbackRegistry::new().with_loader("solr", loader);
    let resolver = create_resolver(backend, None, fallbacks);

    // Act
    let result = resolver.load_batch(vec!["solr|1"], true).await;

    // Assert
    assert!(matches!(result, Err(DomainError::FallbackFailure { .. })));
}

// ============================================================
// Section 2: Reconciliation
// ============================================================

#[tokio::test]
async fn test_batch_mixes_cache_backend_and_placeholder_in_request_order() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.add("solr", "2").await;
    let cache = Arc::new(MockRecordCache::new().primary_for("solr"));
    cache.add("solr", "1").await;
    let resolver = create_resolver(backend, Some(cache), FallbackRegistry::new());

    // Act
    let records = resolver
        .load_batch(vec!["solr|1", "solr|2", "solr|3"], false)
        .await
        .unwrap();

    // Assert
    assert_eq!(
        summary(&records),
        vec![
            row("solr", "1", "cache"),
            row("solr", "2", "backend"),
            row("solr", "3", "missing"),
        ]
    );
}

#[tokio::test]
async fn test_batch_preserves_order_across_interleaved_sources() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.add("solr", "1").await;
    backend.add("solr", "2").await;
    backend.add("summon", "a").await;
    backend.add("summon", "b").await;
    let resolver = create_resolver(backend.clone(), None, FallbackRegistry::new());

    // Act
    let records = resolver
        .load_batch(vec!["summon|b", "solr|2", "summon|a", "solr|1"], false)
        .await
        .unwrap();

    // Assert
    assert_eq!(
        summary(&records),
        vec![
            row("summon", "b", "backend"),
            row("solr", "2", "backend"),
            row("summon", "a", "backend"),
            row("solr", "1", "backend"),
        ]
    );
    // One backend call per source, each with distinct ids.
    assert_eq!(backend.retrieve_calls().len(), 2);
}

#[tokio::test]
async fn test_duplicate_requests_each_receive_a_record() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.add("solr", "1").await;
    let resolver = create_resolver(backend.clone(), None, FallbackRegistry::new());

    // Act
    let mut records = resolver
        .load_batch(vec!["solr|1", "solr|9", "solr|1"], false)
        .await
        .unwrap();

    // Assert
    assert_eq!(
        backend.retrieve_calls(),
        vec![("solr".to_string(), ids(&["1", "9"]))]
    );
    assert_eq!(
        summary(&records),
        vec![
            row("solr", "1", "backend"),
            row("solr", "9", "missing"),
            row("solr", "1", "backend"),
        ]
    );

    // Copies are independent values.
    records[0] = records[0].clone().with_field("note", "edited");
    assert!(records[2].field("note").is_none());
}

#[tokio::test]
async fn test_duplicate_unresolved_requests_each_receive_a_placeholder() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    let resolver = create_resolver(backend, None, FallbackRegistry::new());

    // Act
    let records = resolver
        .load_batch(vec!["solr|x", "solr|x"], false)
        .await
        .unwrap();

    // Assert
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(Record::is_missing));
    assert_eq!(resolver.metrics().snapshot().placeholders, 2);
}

#[tokio::test]
async fn test_renamed_record_lands_in_position_requested_under_old_id() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.add("solr", "1").await;
    let loader = Arc::new(MockFallbackLoader::new().with_renamed("solr", "old", "new"));
    let fallbacks = FallbackRegistry::new().with_loader("solr", loader);
    let resolver = create_resolver(backend, None, fallbacks);

    // Act
    let records = resolver
        .load_batch(vec!["solr|old", "solr|1"], false)
        .await
        .unwrap();

    // Assert
    assert_eq!(records[0].unique_id(), "new");
    assert_eq!(records[0].previous_unique_id(), Some("old"));
    assert!(!records[0].is_missing());
    assert_eq!(origin(&records[1]), Some("backend"));
}

#[tokio::test]
async fn test_unrequested_record_is_dropped() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    let loader = Arc::new(
        MockFallbackLoader::new()
            .with_unrequested(Record::new("solr", "stray").with_previous_unique_id("ghost")),
    );
    let fallbacks = FallbackRegistry::new().with_loader("solr", loader);
    let resolver = create_resolver(backend, None, fallbacks);

    // Act
    let records = resolver.load_batch(vec!["solr|1"], false).await.unwrap();

    // Assert
    assert_eq!(records.len(), 1);
    assert!(records[0].is_missing());
    assert_eq!(records[0].unique_id(), "1");
    assert_eq!(resolver.metrics().snapshot().dropped_records, 1);
}

#[tokio::test]
async fn test_placeholder_carries_request_extra_fields() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    let resolver = create_resolver(backend, None, FallbackRegistry::new());
    let mut extra = ExtraFields::new();
    extra.insert("title".to_string(), json!("X"));

    // Act
    let records = resolver
        .load_batch(
            vec![IdentifierSpec::with_extra_fields("solr", "123", extra)],
            false,
        )
        .await
        .unwrap();

    // Assert
    assert!(records[0].is_missing());
    assert_eq!(records[0].unique_id(), "123");
    assert_eq!(records[0].source_identifier(), "solr");
    assert_eq!(records[0].field("title"), Some(&json!("X")));
}

#[tokio::test]
async fn test_extra_fields_are_ignored_for_resolved_entries() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.add("solr", "1").await;
    let resolver = create_resolver(backend, None, FallbackRegistry::new());
    let mut extra = ExtraFields::new();
    extra.insert("title".to_string(), json!("seed"));

    // Act
    let records = resolver
        .load_batch(
            vec![IdentifierSpec::with_extra_fields("solr", "1", extra)],
            false,
        )
        .await
        .unwrap();

    // Assert
    assert!(records[0].field("title").is_none());
}

#[tokio::test]
async fn test_empty_batch_returns_empty_result() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    let resolver = create_resolver(backend.clone(), None, FallbackRegistry::new());

    // Act
    let records = resolver
        .load_batch(Vec::<IdentifierSpec>::new(), false)
        .await
        .unwrap();

    // Assert
    assert!(records.is_empty());
    assert!(backend.retrieve_calls().is_empty());
}

#[tokio::test]
async fn test_empty_id_becomes_placeholder_without_lookup() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    let resolver = create_resolver(backend.clone(), None, FallbackRegistry::new());

    // Act
    let records = resolver.load_batch(vec!["solr|"], false).await.unwrap();

    // Assert
    assert_eq!(records.len(), 1);
    assert!(records[0].is_missing());
    assert!(backend.retrieve_calls().is_empty());
}

#[tokio::test]
async fn test_record_with_empty_previous_id_does_not_fill_empty_request() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    let loader = Arc::new(
        MockFallbackLoader::new()
            .with("solr", "1")
            .with_unrequested(Record::new("solr", "stray").with_previous_unique_id("")),
    );
    let fallbacks = FallbackRegistry::new().with_loader("solr", loader);
    let resolver = create_resolver(backend, None, fallbacks);

    // Act
    let records = resolver
        .load_batch(vec!["solr|", "solr|1"], false)
        .await
        .unwrap();

    // Assert
    assert!(records[0].is_missing());
    assert_eq!(records[0].unique_id(), "");
    assert_eq!(origin(&records[1]), Some("fallback"));
    assert_eq!(resolver.metrics().snapshot().dropped_records, 1);
}

#[tokio::test]
async fn test_invalid_compact_identifier_fails_batch() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    let resolver = create_resolver(backend, None, FallbackRegistry::new());

    // Act
    let result = resolver.load_batch(vec!["solr|1", "nonsense"], true).await;

    // Assert
    assert!(matches!(
        result,
        Err(DomainError::InvalidIdentifier { ref value }) if value == "nonsense"
    ));
}

// ============================================================
// Section 3: Failure Tolerance Across Sources
// ============================================================

#[tokio::test]
async fn test_tolerant_batch_never_fails_on_backend_errors() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.add("summon", "a").await;
    backend.fail_source("solr").await;
    let resolver = create_resolver(backend, None, FallbackRegistry::new());

    // Act
    let records = resolver
        .load_batch(vec!["solr|1", "summon|a", "solr|2"], true)
        .await
        .unwrap();

    // Assert
    assert_eq!(
        summary(&records),
        vec![
            row("solr", "1", "missing"),
            row("summon", "a", "backend"),
            row("solr", "2", "missing"),
        ]
    );
}

#[tokio::test]
async fn test_intolerant_batch_fails_on_first_backend_error() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.add("summon", "a").await;
    backend.fail_source("solr").await;
    let config = ResolverConfig::default().with_max_concurrent_sources(1);
    let resolver = create_resolver_with_config(backend, None, FallbackRegistry::new(), config);

    // Act
    let result = resolver
        .load_batch(vec!["solr|1", "summon|a"], false)
        .await;

    // Assert
    assert_eq!(
        result.unwrap_err(),
        DomainError::BackendFailure {
            source_name: "solr".to_string(),
            message: "connection refused".to_string(),
        }
    );
}

#[tokio::test]
async fn test_sequential_sources_stop_after_failure() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new());
    backend.fail_source("solr").await;
    let config = ResolverConfig::default().with_max_concurrent_sources(1);
    let resolver =
        create_resolver_with_config(backend.clone(), None, FallbackRegistry::new(), config);

    // Act
    let result = resolver
        .load_batch(vec!["solr|1", "summon|a"], false)
        .await;

    // Assert
    assert!(result.is_err());
    let sources: Vec<String> = backend
        .retrieve_calls()
        .into_iter()
        .map(|(source, _)| source)
        .collect();
    assert_eq!(sources, vec!["solr".to_string()]);
}

#[tokio::test]
async fn test_batch_times_out() {
    // Arrange
    let backend = Arc::new(MockSearchBackend::new().with_delay(Duration::from_millis(200)));
    let config = ResolverConfig::default().with_timeout(Duration::from_millis(20));
    let resolver = create_resolver_with_config(backend, None, FallbackRegistry::new(), config);

    // Act
    let result = resolver.load_batch(vec!["solr|1"], true).await;

    // Assert
    assert_eq!(result.unwrap_err(), DomainError::Timeout { duration_ms: 20 });
}

#[tokio::test]
async fn test_concurrent_sources_produce_same_result_as_sequential() {
    // Arrange
    let request = vec![
        "solr|1", "summon|a", "worldcat|x", "solr|2", "summon|zz", "solr|1",
    ];
    let mut results = Vec::new();
    for concurrency in [1, 8] {
        let backend = Arc::new(MockSearchBackend::new());
        backend.add("solr", "1").await;
        backend.add("summon", "a").await;
        backend.add("worldcat", "x").await;
        let config = ResolverConfig::default().with_max_concurrent_sources(concurrency);
        let resolver =
            create_resolver_with_config(backend, None, FallbackRegistry::new(), config);

        // Act
        let records = resolver.load_batch(request.clone(), false).await.unwrap();
        results.push(summary(&records));
    }

    // Assert
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].len(), request.len());
}
