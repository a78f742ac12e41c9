//! Observability setup for the record service.

pub mod logging;

pub use logging::{init_logging, LoggingConfig};
