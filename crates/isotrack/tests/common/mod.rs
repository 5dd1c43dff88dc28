//! Shared test utilities for isotrack integration tests.
//!
//! - `TestHarness`: four stage directories and a database in a temp dir
//! - fixed clock helpers so dwell boundaries are tested without sleeping

pub mod harness;

pub use harness::{at, drain_events, t0, TestHarness};
