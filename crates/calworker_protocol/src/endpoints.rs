//! Endpoint names.
//!
//! Endpoints are namespaced by domain (`accounts/create`, `calendars/observe`).
//! The constants below are the surface exposed by the calendar service.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Stable name of one operation exposed over the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    /// Creates an endpoint name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain part (`accounts` for `accounts/create`).
    pub fn domain(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for Endpoint {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Returns its arguments unchanged.
pub const ECHO: &str = "echo";

/// Lists every account.
pub const ACCOUNTS: &str = "accounts";
/// Fetches one account by id.
pub const ACCOUNTS_GET: &str = "accounts/get";
/// Verifies, persists and syncs a new account.
pub const ACCOUNTS_CREATE: &str = "accounts/create";
/// Removes an account with its calendars and events.
pub const ACCOUNTS_REMOVE: &str = "accounts/remove";
/// Filters a preset list down to the presets still available.
pub const ACCOUNTS_PRESETS: &str = "accounts/presets";
/// Stream of the account list.
pub const ACCOUNTS_OBSERVE: &str = "accounts/observe";

/// Updates one calendar.
pub const CALENDARS_UPDATE: &str = "calendars/update";
/// Stream of the calendar list.
pub const CALENDARS_OBSERVE: &str = "calendars/observe";

/// Creates an event.
pub const EVENTS_CREATE: &str = "events/create";
/// Updates an event.
pub const EVENTS_UPDATE: &str = "events/update";
/// Removes an event.
pub const EVENTS_REMOVE: &str = "events/remove";

/// Fetches an event with its calendar and account.
pub const RECORDS_GET: &str = "records/get";

/// Reads a setting.
pub const SETTINGS_GET: &str = "settings/get";
/// Writes a setting.
pub const SETTINGS_SET: &str = "settings/set";
/// Stream of one setting's value.
pub const SETTINGS_OBSERVE: &str = "settings/observe";

/// Starts a sync of every account.
pub const SYNC_ALL: &str = "sync/all";
