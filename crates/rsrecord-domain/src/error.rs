//! Domain error types for record resolution.

use thiserror::Error;

/// Domain-specific errors for record resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// No tier produced a record for a single-identifier lookup.
    #[error("record not found: {source_name}|{id}")]
    RecordNotFound { source_name: String, id: String },

    /// The search backend raised an error (distinct from "not found").
    #[error("backend failure for source '{source_name}': {message}")]
    BackendFailure { source_name: String, message: String },

    /// The record cache raised an error.
    #[error("cache failure: {message}")]
    CacheFailure { message: String },

    /// A fallback loader raised an error.
    #[error("fallback loader failure for source '{source_name}': {message}")]
    FallbackFailure { source_name: String, message: String },

    /// A resolved record does not match any unclaimed requested position.
    #[error("no unclaimed position for record {source_name}|{id}")]
    PositionNotFound { source_name: String, id: String },

    /// A compact identifier could not be parsed.
    #[error("invalid identifier: {value}")]
    InvalidIdentifier { value: String },

    /// The call exceeded its deadline.
    #[error("timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
