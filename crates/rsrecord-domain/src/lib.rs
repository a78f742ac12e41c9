//! rsrecord-domain: Core record resolution logic
//!
//! This crate resolves `(source, id)` pairs into materialized records by
//! consulting, in a source-dependent order, a local record cache, a remote
//! search backend and per-source fallback loaders. Batch calls preserve the
//! caller's order and degrade to placeholder records instead of failing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               rsrecord-domain               │
//! ├─────────────────────────────────────────────┤
//! │  record/     - Record model & placeholders  │
//! │  identifier/ - Batch request normalization  │
//! │  resolver/   - Tiered resolution engine     │
//! │  cache/      - In-memory record cache       │
//! └─────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod identifier;
pub mod record;
pub mod resolver;

// Re-export commonly used types at the crate root
pub use cache::{MemoryRecordCache, RecordCacheConfig};
pub use error::{DomainError, DomainResult};
pub use identifier::{IdentifierList, IdentifierSpec, RequestedEntry, SourceBucket};
pub use record::{ExtraFields, PlaceholderFactory, Record, RecordFactory, RecordKind};
pub use resolver::{
    FallbackLoader, FallbackRegistry, RecordCache, RecordResolver, ResolverConfig, SearchBackend,
};
