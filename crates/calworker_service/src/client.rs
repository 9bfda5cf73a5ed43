//! Typed UI-side client for the calendar service.

use crate::error::ServiceResult;
use calworker_bridge::{BridgeClient, ClientStream};
use calworker_protocol::endpoints::*;
use calworker_protocol::{Account, Args, Calendar, CalendarEvent, EventRecord, Setting, Value};
use std::fmt;

/// Typed wrappers over the calendar endpoints.
///
/// Cloning yields another handle to the same connection.
#[derive(Clone)]
pub struct CalendarClient {
    bridge: BridgeClient,
}

impl CalendarClient {
    /// Wraps a bridge client.
    pub fn new(bridge: BridgeClient) -> Self {
        Self { bridge }
    }

    /// Returns the underlying bridge client, for broadcasts and raw calls.
    pub fn bridge(&self) -> &BridgeClient {
        &self.bridge
    }

    /// Round-trips `args` through the worker.
    pub async fn echo(&self, args: Args) -> ServiceResult<Value> {
        Ok(self.bridge.call(ECHO, args).await?)
    }

    /// Lists every account.
    pub async fn accounts(&self) -> ServiceResult<Vec<Account>> {
        Ok(self.bridge.call_as(ACCOUNTS, Args::new()).await?)
    }

    /// Fetches one account.
    pub async fn account(&self, id: &str) -> ServiceResult<Option<Account>> {
        let args = Args::new().with(id)?;
        Ok(self.bridge.call_as(ACCOUNTS_GET, args).await?)
    }

    /// Creates an account and syncs it.
    pub async fn create_account(&self, account: &Account) -> ServiceResult<Account> {
        let args = Args::new().with(account)?;
        Ok(self.bridge.call_as(ACCOUNTS_CREATE, args).await?)
    }

    /// Removes an account with everything it owns.
    pub async fn remove_account(&self, id: &str) -> ServiceResult<bool> {
        let args = Args::new().with(id)?;
        Ok(self.bridge.call_as(ACCOUNTS_REMOVE, args).await?)
    }

    /// Filters `presets` down to those that may still back a new account.
    pub async fn available_presets(&self, presets: &[String]) -> ServiceResult<Vec<String>> {
        let args = Args::new().with(presets)?;
        Ok(self.bridge.call_as(ACCOUNTS_PRESETS, args).await?)
    }

    /// Streams the account list.
    pub async fn observe_accounts(&self) -> ServiceResult<ClientStream> {
        Ok(self.bridge.subscribe(ACCOUNTS_OBSERVE, Args::new()).await?)
    }

    /// Updates a calendar.
    pub async fn update_calendar(&self, calendar: &Calendar) -> ServiceResult<Calendar> {
        let args = Args::new().with(calendar)?;
        Ok(self.bridge.call_as(CALENDARS_UPDATE, args).await?)
    }

    /// Streams the calendar list.
    pub async fn observe_calendars(&self) -> ServiceResult<ClientStream> {
        Ok(self.bridge.subscribe(CALENDARS_OBSERVE, Args::new()).await?)
    }

    /// Creates an event.
    pub async fn create_event(&self, event: &CalendarEvent) -> ServiceResult<CalendarEvent> {
        let args = Args::new().with(event)?;
        Ok(self.bridge.call_as(EVENTS_CREATE, args).await?)
    }

    /// Updates an event.
    pub async fn update_event(&self, event: &CalendarEvent) -> ServiceResult<CalendarEvent> {
        let args = Args::new().with(event)?;
        Ok(self.bridge.call_as(EVENTS_UPDATE, args).await?)
    }

    /// Removes an event.
    pub async fn remove_event(&self, event: &CalendarEvent) -> ServiceResult<bool> {
        let args = Args::new().with(event)?;
        Ok(self.bridge.call_as(EVENTS_REMOVE, args).await?)
    }

    /// Fetches an event with its calendar and account.
    pub async fn fetch_record(&self, event_id: &str) -> ServiceResult<EventRecord> {
        let args = Args::new().with(event_id)?;
        Ok(self.bridge.call_as(RECORDS_GET, args).await?)
    }

    /// Reads a setting.
    pub async fn setting(&self, id: &str) -> ServiceResult<Option<Value>> {
        let args = Args::new().with(id)?;
        Ok(self.bridge.call_as(SETTINGS_GET, args).await?)
    }

    /// Writes a setting.
    pub async fn set_setting(&self, id: &str, value: Value) -> ServiceResult<Setting> {
        let args = Args::new().with(id)?.with(&value)?;
        Ok(self.bridge.call_as(SETTINGS_SET, args).await?)
    }

    /// Streams one setting's value.
    pub async fn observe_setting(&self, id: &str) -> ServiceResult<ClientStream> {
        let args = Args::new().with(id)?;
        Ok(self.bridge.subscribe(SETTINGS_OBSERVE, args).await?)
    }

    /// Starts a sync of every account. Returns once the sync is under way.
    pub async fn sync_all(&self) -> ServiceResult<()> {
        self.bridge.call(SYNC_ALL, Args::new()).await?;
        Ok(())
    }

    /// Closes the connection to the worker.
    pub async fn close(&self) -> ServiceResult<()> {
        Ok(self.bridge.close().await?)
    }
}

impl fmt::Debug for CalendarClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarClient")
            .field("bridge", &self.bridge)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{event, local, Harness};
    use serde_json::json;

    #[tokio::test]
    async fn typed_round_trips() {
        let harness = Harness::loaded().await;
        let client = harness.service.client();

        let account = client.create_account(&local()).await.unwrap();
        assert_eq!(client.account(&account.id).await.unwrap(), Some(account.clone()));
        assert_eq!(client.accounts().await.unwrap(), vec![account.clone()]);
        assert_eq!(
            client
                .available_presets(&["local".to_string(), "google".to_string()])
                .await
                .unwrap(),
            ["google"]
        );

        let mut calendar = harness.accounts.calendars(&account.id).unwrap().remove(0);
        calendar.color = "#00aacc".to_string();
        assert_eq!(client.update_calendar(&calendar).await.unwrap(), calendar);

        let created = client.create_event(&event(&calendar.id, 0, 60)).await.unwrap();
        let record = client.fetch_record(&created.id).await.unwrap();
        assert_eq!(record.calendar.color, "#00aacc");
        assert_eq!(record.account.id, account.id);

        let mut renamed = created.clone();
        renamed.title = "Retro".to_string();
        assert_eq!(client.update_event(&renamed).await.unwrap().title, "Retro");
        assert!(client.remove_event(&renamed).await.unwrap());

        let setting = client.set_setting("syncFrequency", json!(15)).await.unwrap();
        assert_eq!(setting.value, json!(15));

        assert!(client.remove_account(&account.id).await.unwrap());
        assert_eq!(client.account(&account.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn calendar_observer_sees_updates() {
        let harness = Harness::loaded().await;
        let client = harness.service.client();
        let account = client.create_account(&local()).await.unwrap();

        let stream = client.observe_calendars().await.unwrap();
        let mut updates = stream.listen_channel();
        let initial = updates.recv().await.unwrap();
        assert_eq!(initial.as_array().map(Vec::len), Some(1));

        let mut calendar = harness.accounts.calendars(&account.id).unwrap().remove(0);
        calendar.local_display = false;
        client.update_calendar(&calendar).await.unwrap();
        let updated = updates.recv().await.unwrap();
        assert_eq!(updated[0]["localDisplay"], json!(false));
        stream.cancel().await;
    }

    #[tokio::test]
    async fn closed_client_fails_with_transport_error() {
        let harness = Harness::loaded().await;
        let client = harness.service.client();
        client.accounts().await.unwrap();
        client.close().await.unwrap();
        let err = client.accounts().await.unwrap_err();
        assert!(matches!(err, crate::ServiceError::Bridge(e) if e.is_transport()));
    }
}
