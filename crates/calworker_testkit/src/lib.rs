//! # Calworker Testkit
//!
//! Test utilities for the calendar worker.
//!
//! This crate provides:
//! - Fixtures: accounts, calendars, prepopulated stores, worker/client pairs
//! - `ScriptedAdapter`, a sync adapter whose failures and timing are scripted
//! - Recording collaborators: `RecordingSink`, `FixedConnectivity`, `EventLog`
//! - Property-based test generators using proptest
//!
//! The cross-crate tests live in this crate's `tests/` directory.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use calworker_testkit::prelude::*;
//!
//! let directory = Directory::generate(3, 2);
//! let adapter = Arc::new(ScriptedAdapter::new().fail_account("a2"));
//! let sink = Arc::new(RecordingSink::new());
//! let sync = directory.orchestrator(adapter.clone(), sink.clone());
//! sync.sync_all().await;
//! assert_eq!(sink.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod adapters;
pub mod fixtures;
pub mod generators;
pub mod recorders;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::recorders::*;
}

pub use adapters::*;
pub use fixtures::*;
pub use generators::*;
pub use recorders::*;
