#![deny(unsafe_code)]

//! Shared test utilities for the matchbar workspace.
//!
//! Provides the reference data sources, config builders, settings-file
//! helpers and tracing setup so that individual crate tests stay concise and
//! consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! matchbar-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fixtures;
pub mod settings;
pub mod tracing_setup;
