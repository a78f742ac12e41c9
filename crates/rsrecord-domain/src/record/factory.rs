//! Placeholder record construction.

use super::{ExtraFields, Record};

/// Builds stand-in records for requests no tier could resolve.
pub trait RecordFactory: Send + Sync {
    /// Creates a placeholder carrying the requested id, source and seed fields.
    fn missing(&self, source: &str, id: &str, extra_fields: &ExtraFields) -> Record;
}

/// Default factory: a `Missing` record seeded with the request's extra fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderFactory;

impl RecordFactory for PlaceholderFactory {
    fn missing(&self, source: &str, id: &str, extra_fields: &ExtraFields) -> Record {
        Record::missing(source, id).with_fields(extra_fields.clone())
    }
}
