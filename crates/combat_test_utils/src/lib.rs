//! # Combat Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Catalog and battle fixtures
//! - Determinism test harness
//! - Matchup statistics
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod balance;
pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
