//! Record model shared by every resolution tier.
//!
//! Records from the cache, the search backend and fallback loaders are all
//! represented by the same [`Record`] type. Placeholders for unresolved
//! requests use the same type tagged [`RecordKind::Missing`].

mod factory;

pub use factory::{PlaceholderFactory, RecordFactory};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Seed fields carried by a request and copied onto its placeholder.
pub type ExtraFields = BTreeMap<String, Value>;

/// Whether a record was resolved by a tier or synthesized as a stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Resolved,
    Missing,
}

/// A materialized record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    unique_id: String,
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_unique_id: Option<String>,
    kind: RecordKind,
    #[serde(default)]
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates a resolved record.
    pub fn new(source: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            source: source.into(),
            previous_unique_id: None,
            kind: RecordKind::Resolved,
            fields: BTreeMap::new(),
        }
    }

    /// Creates a placeholder for a request nothing could resolve.
    pub fn missing(source: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            kind: RecordKind::Missing,
            ..Self::new(source, unique_id)
        }
    }

    /// Records the identifier this record was known under before a rename
    /// or merge.
    pub fn with_previous_unique_id(mut self, previous: impl Into<String>) -> Self {
        self.previous_unique_id = Some(previous.into());
        self
    }

    /// Sets a single field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Sets several fields at once, overwriting existing names.
    pub fn with_fields(mut self, fields: ExtraFields) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn source_identifier(&self) -> &str {
        &self.source
    }

    /// The identifier this record replaced, if a fallback loader resolved it
    /// under a new canonical id.
    pub fn previous_unique_id(&self) -> Option<&str> {
        self.previous_unique_id.as_deref()
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn is_missing(&self) -> bool {
        self.kind == RecordKind::Missing
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}
