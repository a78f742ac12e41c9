//! rsrecord-service: Configuration and request handling
//!
//! This crate wraps the record resolver for applications:
//! - Configuration management (YAML file + environment overrides)
//! - Structured logging setup
//! - Record service with batch validation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              rsrecord-service               │
//! ├─────────────────────────────────────────────┤
//! │  config.rs       - Configuration loading    │
//! │  observability/  - Logging setup            │
//! │  service.rs      - Record service facade    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod observability;
pub mod service;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServiceConfig};
pub use service::{RecordService, RecordServiceError, RecordServiceResult};
