//! Test fixtures.
//!
//! Accounts and calendars with predictable ids, stores prepopulated with
//! them, and a started worker with a connected client.

use async_trait::async_trait;
use calworker_bridge::{BridgeClient, BridgeService, MemoryTransport, ReadyConnector};
use calworker_protocol::{Account, Calendar, CalendarEvent};
use calworker_service::{
    CalendarClient, CalendarService, ServiceBuilder, ServiceConfig, CALDAV_PROVIDER,
    LOCAL_PROVIDER,
};
use calworker_store::StoreConfig;
use calworker_sync::{ErrorSink, SyncAdapter, SyncOrchestrator, SyncResult, SyncSource};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Creates a CalDAV account with id `id`.
pub fn caldav_account(id: &str) -> Account {
    Account::new(CALDAV_PROVIDER, "caldav")
        .with_id(id)
        .with_user(format!("{id}@example.com"))
}

/// Creates a local account with id `id`.
pub fn local_account(id: &str) -> Account {
    Account::new(LOCAL_PROVIDER, "local").with_id(id)
}

/// Creates calendar number `n` of `account_id`, with id `{account_id}-c{n}`.
pub fn calendar(account_id: &str, n: usize) -> Calendar {
    Calendar::new(
        format!("{account_id}-c{n}"),
        account_id,
        format!("Calendar {n}"),
    )
}

/// Creates a one-hour event starting at `start` (milliseconds).
pub fn event(calendar_id: &str, start: i64) -> CalendarEvent {
    CalendarEvent {
        id: String::new(),
        calendar_id: calendar_id.to_string(),
        title: "Planning".to_string(),
        start,
        end: start + 3_600_000,
        recurrence: None,
    }
}

/// Creates a weekly recurring event.
pub fn recurring_event(calendar_id: &str, start: i64) -> CalendarEvent {
    CalendarEvent {
        recurrence: Some("FREQ=WEEKLY".to_string()),
        ..event(calendar_id, start)
    }
}

/// A fixed set of accounts and calendars.
///
/// Usable directly as a [`SyncSource`], or written into a store snapshot.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    /// Accounts, in id order.
    pub accounts: Vec<Account>,
    /// Calendars of every account.
    pub calendars: Vec<Calendar>,
}

impl Directory {
    /// Generates CalDAV accounts `a1..=aN`, each with `calendars` calendars.
    pub fn generate(accounts: usize, calendars: usize) -> Self {
        let mut directory = Self::default();
        for a in 1..=accounts {
            let account = caldav_account(&format!("a{a}"));
            for c in 1..=calendars {
                directory.calendars.push(calendar(&account.id, c));
            }
            directory.accounts.push(account);
        }
        directory
    }

    /// Returns the total number of sync units a full sync runs.
    pub fn unit_count(&self) -> usize {
        self.accounts.len() + self.calendars.len()
    }

    /// Returns a store configuration whose snapshot holds this directory.
    pub fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::new("fixture");
        for account in &self.accounts {
            config = config.with_record("accounts", json_of(account));
        }
        for calendar in &self.calendars {
            config = config.with_record("calendars", json_of(calendar));
        }
        config
    }

    /// Builds an orchestrator that syncs this directory.
    pub fn orchestrator(
        &self,
        adapter: Arc<dyn SyncAdapter>,
        errors: Arc<dyn ErrorSink>,
    ) -> SyncOrchestrator {
        SyncOrchestrator::builder(Arc::new(self.clone()), adapter)
            .with_error_sink(errors)
            .build()
    }
}

fn json_of<T: serde::Serialize>(record: &T) -> serde_json::Value {
    serde_json::to_value(record).unwrap_or_else(|_| json!({}))
}

#[async_trait]
impl SyncSource for Directory {
    async fn accounts(&self) -> SyncResult<Vec<Account>> {
        Ok(self.accounts.clone())
    }

    async fn calendars(&self, account_id: &str) -> SyncResult<Vec<Calendar>> {
        Ok(self
            .calendars
            .iter()
            .filter(|c| c.account_id == account_id)
            .cloned()
            .collect())
    }
}

/// A calendar service with a connected typed client.
pub struct WorkerPair {
    /// The worker.
    pub service: Arc<CalendarService>,
    /// A client connected to it in-process.
    pub client: CalendarClient,
}

impl WorkerPair {
    /// Builds a service from `builder` and connects a client to it.
    pub fn build(builder: ServiceBuilder) -> Self {
        let service = builder.build().expect("Failed to build calendar service");
        let client = service.client();
        Self { service, client }
    }

    /// Builds a service over a store prepopulated with `directory`.
    pub fn with_directory(directory: &Directory, adapter: Arc<dyn SyncAdapter>) -> Self {
        let config = ServiceConfig::default().with_store(directory.store_config());
        Self::build(CalendarService::builder(adapter).with_config(config))
    }
}

/// Returns a client and a bare service joined by an in-memory channel.
///
/// The service session is already being served.
pub fn connected(service: &Arc<BridgeService>) -> BridgeClient {
    let (ui, worker) = MemoryTransport::pair();
    service.spawn(Arc::new(worker));
    BridgeClient::new(ReadyConnector::new(Arc::new(ui)))
}

/// Polls `condition` until it holds, panicking after two seconds.
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within two seconds");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_directory() {
        let directory = Directory::generate(3, 2);
        assert_eq!(directory.accounts.len(), 3);
        assert_eq!(directory.calendars.len(), 6);
        assert_eq!(directory.unit_count(), 9);
        assert_eq!(directory.calendars[2].id, "a2-c1");
        assert_eq!(directory.store_config().snapshot.len(), 9);
    }

    #[tokio::test]
    async fn directory_is_a_source() {
        let directory = Directory::generate(2, 3);
        assert_eq!(directory.calendars("a2").await.unwrap().len(), 3);
        assert!(directory.calendars("a9").await.unwrap().is_empty());
    }

    #[test]
    fn recurring_fixture_has_a_rule() {
        let event = recurring_event("c1", 0);
        assert_eq!(event.end, 3_600_000);
        assert!(event.recurrence.is_some());
    }
}
