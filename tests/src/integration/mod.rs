//! # Integration Tests
//!
//! Whole-runtime scenarios across crate boundaries.

pub mod http_errors;
pub mod runtime_lifecycle;
