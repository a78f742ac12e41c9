//! Position-indexed identifier table for one batch call.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{DomainError, DomainResult};
use crate::record::Record;

use super::{IdentifierSpec, RequestedEntry};

/// Key for matching records to requested slots: (source, id).
type SlotKey = (String, String);

/// The distinct ids requested under one source, in first-request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBucket {
    pub source: String,
    pub ids: Vec<String>,
}

/// Request-scoped table of requested slots.
///
/// Duplicate `(source, id)` requests keep separate slots. Each slot is
/// claimed at most once; claims for a duplicated key are handed out in
/// ascending position order.
#[derive(Debug, Clone)]
pub struct IdentifierList {
    entries: Vec<RequestedEntry>,
    /// Unclaimed positions per key, front = lowest position.
    unclaimed: HashMap<SlotKey, VecDeque<usize>>,
}

impl IdentifierList {
    /// Normalizes a batch request, preserving input order and duplicates.
    ///
    /// Fails if any compact identifier cannot be parsed.
    pub fn new<I, S>(specs: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<IdentifierSpec>,
    {
        let entries = specs
            .into_iter()
            .enumerate()
            .map(|(position, spec)| RequestedEntry::from_spec(position, spec.into()))
            .collect::<DomainResult<Vec<_>>>()?;

        // Empty ids are never claimable; they always end up as placeholders.
        let mut unclaimed: HashMap<SlotKey, VecDeque<usize>> = HashMap::new();
        for entry in entries.iter().filter(|entry| !entry.id.is_empty()) {
            unclaimed
                .entry((entry.source.clone(), entry.id.clone()))
                .or_default()
                .push_back(entry.position);
        }

        Ok(Self { entries, unclaimed })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Groups distinct ids by source.
    ///
    /// Sources appear in the order they were first requested. Empty ids are
    /// left out: they can never be resolved and end up as placeholders.
    pub fn ids_by_source(&self) -> Vec<SourceBucket> {
        let mut buckets: Vec<SourceBucket> = Vec::new();
        let mut bucket_index: HashMap<&str, usize> = HashMap::new();
        let mut seen: HashSet<(&str, &str)> = HashSet::new();

        for entry in &self.entries {
            if entry.id.is_empty() || !seen.insert((entry.source.as_str(), entry.id.as_str())) {
                continue;
            }
            let index = *bucket_index.entry(entry.source.as_str()).or_insert_with(|| {
                buckets.push(SourceBucket {
                    source: entry.source.clone(),
                    ids: Vec::new(),
                });
                buckets.len() - 1
            });
            buckets[index].ids.push(entry.id.clone());
        }

        buckets
    }

    /// Claims the next unclaimed position requested for this record.
    ///
    /// Matches on the record's own unique id first, then on its previous
    /// unique id so a request made under a superseded identifier is still
    /// satisfied.
    pub fn record_position(&mut self, record: &Record) -> DomainResult<usize> {
        let source = record.source_identifier();
        let candidates = std::iter::once(record.unique_id()).chain(record.previous_unique_id());

        for id in candidates {
            if let Some(position) = self.claim(source, id) {
                return Ok(position);
            }
        }

        Err(DomainError::PositionNotFound {
            source_name: source.to_string(),
            id: record.unique_id().to_string(),
        })
    }

    fn claim(&mut self, source: &str, id: &str) -> Option<usize> {
        self.unclaimed
            .get_mut(&(source.to_string(), id.to_string()))
            .and_then(VecDeque::pop_front)
    }

    /// All requested entries in position order.
    pub fn all(&self) -> &[RequestedEntry] {
        &self.entries
    }
}
