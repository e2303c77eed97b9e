//! # FiberSync Testkit
//!
//! Test utilities for FiberSync.
//!
//! This crate provides:
//! - A wired-up orchestrator harness over an in-memory remote and store
//! - Temporary file-backed stores
//! - Fault injection for local writes
//! - Recording notifier and invalidator
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fibersync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn widgets_sync() {
//!     let harness = TestHarness::new(StrategyRegistry::builder().full("widgets").build());
//!     harness.remote.set_rows("widgets", rows_with_ids(1..=3));
//!     let outcome = harness.orchestrator.run_sync(&["widgets"]).await.unwrap();
//!     assert_eq!(outcome.count_for("widgets"), Some(3));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod recorders;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::recorders::*;
    pub use fibersync_engine::{EngineConfig, StrategyRegistry};
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use recorders::*;
