//! # Musim Testing Utils
//!
//! Shared testing utilities for the musim workspace: in-memory collaborators
//! for discovery, transport, metrics and workload, plus message builders and
//! polling helpers.
//!
//! ```toml
//! [dev-dependencies]
//! musim-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
