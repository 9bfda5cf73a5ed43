//! Store collection names and the record fields they are indexed by.

/// Accounts, keyed by account id.
pub const ACCOUNTS: &str = "accounts";

/// Calendars, keyed by calendar id.
pub const CALENDARS: &str = "calendars";

/// Events, keyed by event id.
pub const EVENTS: &str = "events";

/// Settings, keyed by setting name.
pub const SETTINGS: &str = "settings";

/// Field linking a calendar to its account.
pub const ACCOUNT_ID: &str = "accountId";

/// Field linking an event to its calendar.
pub const CALENDAR_ID: &str = "calendarId";
