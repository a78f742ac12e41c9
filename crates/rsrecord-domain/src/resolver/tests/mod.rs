//! Tests for the record resolver module.
//!
//! Organized by functionality:
//! - Single-identifier loading (tier order, placeholders, failures)
//! - Per-source batch resolution and reconciliation
//! - Property-based order preservation


mod batch_tests;
