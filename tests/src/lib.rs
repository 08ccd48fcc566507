//! # Connector Test Suite
//!
//! Unified test crate for scenarios that span several crates.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── http_errors.rs        # error envelope for every failure class
//!     └── runtime_lifecycle.rs  # config file → running host → shutdown
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p connector-tests
//!
//! # By scenario
//! cargo test -p connector-tests integration::http_errors::
//! cargo test -p connector-tests integration::runtime_lifecycle::
//! ```

pub mod integration;
