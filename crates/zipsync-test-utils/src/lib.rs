//! Shared test utilities for the zipsync workspace.
//!
//! This crate provides standardised test fixtures so crate test suites do not
//! each grow their own. It is a dev-dependency only and never published.
//!
//! # Modules
//!
//! - [`tree`]: [`TestTree`] builder for temporary directory trees
//! - [`flaky`]: [`FlakyStore`], a container store that fails on demand

pub mod flaky;
pub mod tree;

pub use flaky::{FlakyHandle, FlakyStore};
pub use tree::TestTree;
