//! Plain records that cross the bridge.
//!
//! These are the serialized shapes only; model behaviour lives with whoever
//! consumes them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A calendar account (a local account or a remote provider login).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account id. Empty until persisted.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Provider type (`Local`, `Caldav`, ...).
    pub provider_type: String,
    /// Preset the account was created from.
    #[serde(default)]
    pub preset: String,
    /// Login name, if the provider needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Server address, if the provider needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Account {
    /// Creates an account record that has not been persisted yet.
    pub fn new(provider_type: impl Into<String>, preset: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            provider_type: provider_type.into(),
            preset: preset.into(),
            user: None,
            domain: None,
        }
    }

    /// Sets the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the login name.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

/// A calendar belonging to an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    /// Calendar id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Owning account id.
    pub account_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Display color.
    #[serde(default)]
    pub color: String,
    /// Whether the calendar is shown in the views.
    #[serde(default = "default_true")]
    pub local_display: bool,
}

fn default_true() -> bool {
    true
}

impl Calendar {
    /// Creates a displayed calendar.
    pub fn new(
        id: impl Into<String>,
        account_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            name: name.into(),
            color: String::new(),
            local_display: true,
        }
    }
}

/// A calendar event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Event id. Empty until persisted.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Owning calendar id.
    pub calendar_id: String,
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Start, milliseconds since the Unix epoch.
    pub start: i64,
    /// End, milliseconds since the Unix epoch.
    pub end: i64,
    /// Recurrence rule, for recurring events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<String>,
}

/// A named setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    /// Setting name.
    #[serde(rename = "_id")]
    pub id: String,
    /// Setting value.
    pub value: Value,
}

/// What the UI needs to know about a provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCapabilities {
    /// The provider has account-level settings.
    pub has_account_settings: bool,
    /// The provider can sync with a remote server.
    pub can_sync: bool,
}

/// One element of the `accounts/observe` stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEntry {
    /// The account.
    pub account: Account,
    /// Capabilities of its provider.
    pub provider: ProviderCapabilities,
}

/// Everything needed to display one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// The event.
    pub event: CalendarEvent,
    /// Its calendar.
    pub calendar: Calendar,
    /// The calendar's account.
    pub account: Account,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn account_uses_underscore_id() {
        let account = Account::new("Caldav", "google").with_id("a1");
        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(
            value,
            json!({ "_id": "a1", "providerType": "Caldav", "preset": "google" })
        );
    }

    #[test]
    fn calendar_defaults_to_displayed() {
        let calendar: Calendar =
            serde_json::from_value(json!({ "_id": "c1", "accountId": "a1" })).unwrap();
        assert!(calendar.local_display);
        assert_eq!(calendar.name, "");
    }
}
