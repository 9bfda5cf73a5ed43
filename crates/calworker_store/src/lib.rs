//! # Calworker Store
//!
//! The worker-owned document store behind the calendar service.
//!
//! This crate provides:
//! - `Store`, named collections of JSON documents keyed by `_id`
//! - Non-unique field indexes for query-by-field (`find_by`)
//! - `ChangeFeed`, ordered change events with listener registration
//! - `TypedCollection<T>` for serde-typed access
//!
//! Data lives in memory. `Store::load` is the asynchronous open step: it
//! validates the configured snapshot and makes the store usable. Every other
//! operation fails with `StoreError::NotLoaded` until it succeeds.
//!
//! ## Example
//!
//! ```rust,ignore
//! let store = Store::new(StoreConfig::new("calendar").with_index("calendars", "accountId"));
//! store.load().await?;
//! store.put("calendars", "c1", json!({ "accountId": "a1", "name": "Home" }))?;
//! let owned = store.find_by("calendars", "accountId", &json!("a1"))?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod config;
mod error;
mod index;
mod store;
mod typed;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeType, FeedListenerId};
pub use config::{IndexSpec, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use store::{Store, ID_FIELD};
pub use typed::TypedCollection;
