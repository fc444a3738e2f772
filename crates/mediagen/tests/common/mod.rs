//! Shared test utilities for mediagen integration tests.
//!
//! This module provides `TestHarness`: a temp directory holding a SQLite
//! database in the upstream producer's shape, a fake engine shell script,
//! an output root, and a config file pointing at all of them.

pub mod harness;

pub use harness::TestHarness;
