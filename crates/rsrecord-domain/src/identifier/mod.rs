//! Batch request normalization.
//!
//! An [`IdentifierList`] turns the caller's heterogeneous request into dense,
//! position-indexed [`RequestedEntry`] slots, groups the distinct ids by
//! source for lookup, and maps resolved records back to the slots that
//! requested them.

mod list;

pub use list::{IdentifierList, SourceBucket};

use std::str::FromStr;

use crate::error::{DomainError, DomainResult};
use crate::record::ExtraFields;

/// Separator used by compact `source|id` identifiers.
pub const COMPACT_SEPARATOR: char = '|';

/// One element of a batch request.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentifierSpec {
    /// An explicit source/id pair with optional placeholder seed fields.
    Structured {
        source: String,
        id: String,
        extra_fields: ExtraFields,
    },
    /// A `source|id` string.
    Compact(String),
}

impl IdentifierSpec {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        IdentifierSpec::Structured {
            source: source.into(),
            id: id.into(),
            extra_fields: ExtraFields::new(),
        }
    }

    pub fn with_extra_fields(
        source: impl Into<String>,
        id: impl Into<String>,
        extra_fields: ExtraFields,
    ) -> Self {
        IdentifierSpec::Structured {
            source: source.into(),
            id: id.into(),
            extra_fields,
        }
    }

    pub fn compact(value: impl Into<String>) -> Self {
        IdentifierSpec::Compact(value.into())
    }
}

impl From<&str> for IdentifierSpec {
    fn from(value: &str) -> Self {
        IdentifierSpec::Compact(value.to_string())
    }
}

impl From<String> for IdentifierSpec {
    fn from(value: String) -> Self {
        IdentifierSpec::Compact(value)
    }
}

impl From<(&str, &str)> for IdentifierSpec {
    fn from((source, id): (&str, &str)) -> Self {
        IdentifierSpec::new(source, id)
    }
}

/// A `source|id` pair parsed from its compact form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactIdentifier {
    pub source: String,
    pub id: String,
}

impl FromStr for CompactIdentifier {
    type Err = DomainError;

    /// Splits on the first separator; the id may itself contain `|`.
    fn from_str(value: &str) -> DomainResult<Self> {
        match value.split_once(COMPACT_SEPARATOR) {
            Some((source, id)) if !source.is_empty() => Ok(Self {
                source: source.to_string(),
                id: id.to_string(),
            }),
            _ => Err(DomainError::InvalidIdentifier {
                value: value.to_string(),
            }),
        }
    }
}

/// One request slot, fixed at its original position in the caller's input.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedEntry {
    pub position: usize,
    pub source: String,
    pub id: String,
    pub extra_fields: ExtraFields,
}

impl RequestedEntry {
    fn from_spec(position: usize, spec: IdentifierSpec) -> DomainResult<Self> {
        match spec {
            IdentifierSpec::Structured {
                source,
                id,
                extra_fields,
            } => Ok(Self {
                position,
                source,
                id,
                extra_fields,
            }),
            IdentifierSpec::Compact(value) => {
                let CompactIdentifier { source, id } = value.parse()?;
                Ok(Self {
                    position,
                    source,
                    id,
                    extra_fields: ExtraFields::new(),
                })
            }
        }
    }
}
