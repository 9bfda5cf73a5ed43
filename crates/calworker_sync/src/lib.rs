//! # Calworker Sync
//!
//! Coordinates synchronization of every account and calendar.
//!
//! This crate provides:
//! - `SyncOrchestrator` with `sync_all`, `sync_account` and `sync_calendar`
//! - `PendingCounter`, the single count of sync units in flight
//! - Collaborator traits: `SyncSource`, `SyncAdapter`, `Connectivity`, `ErrorSink`
//! - `SyncError` and `SyncUnitError`
//!
//! ## Lifecycle events
//!
//! The orchestrator emits on its `Broadcaster`:
//! - `syncStart` when the pending count goes from 0 to 1
//! - `syncComplete` when it goes back to 0, or when `sync_all` finds nothing to do
//! - `syncOffline` when `sync_all` is called while offline (followed by `syncComplete`)
//!
//! ## Key Invariants
//!
//! - A unit is counted before its future is first polled and uncounted when
//!   it finishes, even by panic
//! - An account's calendars sync only after the account itself succeeded
//! - A failing unit never aborts its siblings; its error goes to the caller's
//!   callback if there is one, else to the `ErrorSink`
//! - The count never goes below zero

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod counter;
mod error;
mod orchestrator;
mod traits;

pub use counter::PendingCounter;
pub use error::{SyncError, SyncResult, SyncUnit, SyncUnitError};
pub use orchestrator::{OrchestratorBuilder, SyncCallback, SyncOrchestrator};
pub use traits::{AlwaysOnline, Connectivity, ErrorSink, LogErrorSink, SyncAdapter, SyncSource};
