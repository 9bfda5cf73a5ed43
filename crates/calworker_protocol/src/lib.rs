//! # Calworker Protocol
//!
//! Wire types shared by the UI side and the worker side of the calendar bridge.
//!
//! This crate provides:
//! - `Envelope`, the logical message exchanged over a transport
//! - `CorrelationId` and its per-connection allocator
//! - `Endpoint` names and the `endpoints` table used by the calendar service
//! - Lifecycle event names (`SyncEvent`, `ExpandEvent`)
//! - Plain records that cross the bridge (`Account`, `Calendar`, ...)
//! - `Args`, typed access to positional call arguments
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod args;
pub mod endpoints;
mod envelope;
mod error;
mod events;
mod records;

pub use args::Args;
pub use endpoints::Endpoint;
pub use envelope::{CorrelationId, CorrelationIdAllocator, Envelope};
pub use error::{ProtocolError, ProtocolResult};
pub use events::{ExpandEvent, SyncEvent};
pub use records::{
    Account, AccountEntry, Calendar, CalendarEvent, EventRecord, ProviderCapabilities, Setting,
};

/// Dynamic value carried by calls, results, updates and broadcasts.
pub use serde_json::Value;
