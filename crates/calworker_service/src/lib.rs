//! # Calworker Service
//!
//! The calendar worker and its UI-side counterparts.
//!
//! This crate provides:
//! - `CalendarService`, the worker context that owns the store and the sync
//!   orchestrator and exposes them as bridge endpoints
//! - Domain services: `Accounts`, `Calendars`, `Events`, `Settings`, `Records`
//! - `RecurringEvents`, which expands recurring events as they are written
//! - `CalendarClient`, typed wrappers over every endpoint
//! - `SyncStatusListener`, the UI-side view of the sync lifecycle
//! - `DirectRecordLookup`, a same-address-space fallback for record lookup
//!
//! ## Example
//!
//! ```rust,ignore
//! let service = CalendarService::builder(Arc::new(MyCaldavAdapter::new())).build()?;
//! let client = service.client();
//! let account = client.create_account(&Account::new("Caldav", "google")).await?;
//! client.sync_all().await?;
//! ```
//!
//! ## Key Invariants
//!
//! - Startup (event relays, recurring expansion, store load) runs at most
//!   once; every endpoint waits for it and sees the same outcome
//! - `sync/all` returns before syncing; progress arrives as broadcasts
//! - Removing an account removes its calendars and their events
//! - Cancelling an observe stream detaches it from the store

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod accounts;
mod calendars;
mod client;
pub mod collections;
mod config;
mod direct;
mod error;
mod events;
mod handlers;
mod records;
mod recurring;
mod service;
mod settings;
mod source;
mod sync_listener;

#[cfg(test)]
mod testing;

pub use accounts::Accounts;
pub use calendars::Calendars;
pub use client::CalendarClient;
pub use config::{ProviderCatalog, ServiceConfig, CALDAV_PROVIDER, LOCAL_PROVIDER};
pub use direct::DirectRecordLookup;
pub use error::{ServiceError, ServiceResult};
pub use events::Events;
pub use records::Records;
pub use recurring::{Expander, NoopExpander, RecurringEvents};
pub use service::{CalendarService, ServiceBuilder};
pub use settings::Settings;
pub use source::StoreSyncSource;
pub use sync_listener::SyncStatusListener;
