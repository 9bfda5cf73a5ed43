//! Fixtures shared by the unit tests.

use crate::accounts::Accounts;
use crate::calendars::Calendars;
use crate::collections::CALENDARS;
use crate::config::{ServiceConfig, CALDAV_PROVIDER, LOCAL_PROVIDER};
use crate::events::Events;
use crate::records::Records;
use crate::service::CalendarService;
use crate::settings::Settings;
use async_trait::async_trait;
use calworker_protocol::{Account, Calendar, CalendarEvent};
use calworker_store::Store;
use calworker_sync::{SyncAdapter, SyncError, SyncOrchestrator, SyncResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub(crate) fn local() -> Account {
    Account::new(LOCAL_PROVIDER, "local")
}

pub(crate) fn caldav(preset: &str) -> Account {
    Account::new(CALDAV_PROVIDER, preset).with_user("user@example.com")
}

pub(crate) fn event(calendar_id: &str, start: i64, end: i64) -> CalendarEvent {
    CalendarEvent {
        id: String::new(),
        calendar_id: calendar_id.to_string(),
        title: "Standup".to_string(),
        start,
        end,
        recurrence: None,
    }
}

pub(crate) async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[derive(Default)]
struct AdapterState {
    account_syncs: Vec<String>,
    calendar_syncs: Vec<String>,
    remote: Option<(String, usize)>,
    fail_accounts: bool,
}

/// Adapter that records what it was asked to sync.
///
/// Account syncs create the configured remote calendars; calendar syncs wait
/// while held.
pub(crate) struct TestAdapter {
    store: Option<Store>,
    state: Mutex<AdapterState>,
    held: watch::Sender<bool>,
}

impl Default for TestAdapter {
    fn default() -> Self {
        Self {
            store: None,
            state: Mutex::new(AdapterState::default()),
            held: watch::channel(false).0,
        }
    }
}

impl TestAdapter {
    pub(crate) fn new(store: Store) -> Self {
        Self {
            store: Some(store),
            ..Self::default()
        }
    }

    pub(crate) fn remote_calendars(&self, prefix: &str, count: usize) {
        self.state.lock().remote = Some((prefix.to_string(), count));
    }

    pub(crate) fn fail_accounts(&self) {
        self.state.lock().fail_accounts = true;
    }

    pub(crate) fn hold_calendars(&self, hold: bool) {
        self.held.send_replace(hold);
    }

    pub(crate) fn account_syncs(&self) -> Vec<String> {
        self.state.lock().account_syncs.clone()
    }

    pub(crate) fn calendar_syncs(&self) -> Vec<String> {
        self.state.lock().calendar_syncs.clone()
    }
}

#[async_trait]
impl SyncAdapter for TestAdapter {
    async fn sync_account(&self, account: &Account) -> SyncResult<()> {
        let remote = {
            let mut state = self.state.lock();
            state.account_syncs.push(account.id.clone());
            if state.fail_accounts {
                return Err(SyncError::AuthenticationFailed(account.id.clone()));
            }
            state.remote.clone()
        };
        if let (Some(store), Some((prefix, count))) = (&self.store, remote) {
            for i in 0..count {
                let calendar = Calendar::new(
                    format!("{}-{prefix}{i}", account.id),
                    account.id.clone(),
                    format!("{prefix}{i}"),
                );
                store
                    .put_as(CALENDARS, &calendar.id, &calendar)
                    .map_err(|e| SyncError::Source(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn sync_calendar(&self, _account: &Account, calendar: &Calendar) -> SyncResult<()> {
        let mut held = self.held.subscribe();
        let _ = held.wait_for(|held| !*held).await;
        self.state.lock().calendar_syncs.push(calendar.id.clone());
        Ok(())
    }
}

pub(crate) struct Harness {
    pub(crate) service: Arc<CalendarService>,
    pub(crate) store: Store,
    pub(crate) adapter: Arc<TestAdapter>,
    pub(crate) sync: SyncOrchestrator,
    pub(crate) accounts: Accounts,
    pub(crate) calendars: Calendars,
    pub(crate) settings: Settings,
    pub(crate) events: Events,
    pub(crate) records: Records,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let config = ServiceConfig::default();
        let store = Store::new(config.store.clone());
        let adapter = Arc::new(TestAdapter::new(store.clone()));
        let service = CalendarService::builder(adapter.clone())
            .with_config(config)
            .with_store(store.clone())
            .build()
            .unwrap();
        Self {
            sync: service.sync().clone(),
            accounts: service.accounts().clone(),
            calendars: service.calendars().clone(),
            settings: service.settings().clone(),
            events: service.events().clone(),
            records: service.records().clone(),
            service,
            store,
            adapter,
        }
    }

    pub(crate) async fn loaded() -> Self {
        let harness = Self::new();
        harness.service.start().await.unwrap();
        harness
    }

    pub(crate) async fn settle(&self) {
        let sync = self.sync.clone();
        eventually(move || !sync.is_syncing()).await;
    }
}
