//! Account management.

use crate::collections::{ACCOUNTS, ACCOUNT_ID, CALENDARS, CALENDAR_ID, EVENTS};
use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use calworker_bridge::StreamHandle;
use calworker_protocol::{Account, AccountEntry, Calendar, CalendarEvent};
use calworker_store::{Store, TypedCollection};
use calworker_sync::{SyncAdapter, SyncOrchestrator};
use std::fmt;
use std::sync::Arc;

/// Accounts and the calendars they own.
#[derive(Clone)]
pub struct Accounts {
    config: Arc<ServiceConfig>,
    store: Store,
    accounts: TypedCollection<Account>,
    calendars: TypedCollection<Calendar>,
    adapter: Arc<dyn SyncAdapter>,
    sync: SyncOrchestrator,
}

impl Accounts {
    pub(crate) fn new(
        config: Arc<ServiceConfig>,
        store: Store,
        adapter: Arc<dyn SyncAdapter>,
        sync: SyncOrchestrator,
    ) -> Self {
        Self {
            accounts: store.collection(ACCOUNTS),
            calendars: store.collection(CALENDARS),
            config,
            store,
            adapter,
            sync,
        }
    }

    /// Returns every account, in id order.
    pub fn all(&self) -> ServiceResult<Vec<Account>> {
        Ok(self.accounts.all()?)
    }

    /// Returns one account, or `None` if there is no such account.
    pub fn get(&self, id: &str) -> ServiceResult<Option<Account>> {
        Ok(self.accounts.get(id)?)
    }

    /// Returns the calendars of one account.
    pub fn calendars(&self, account_id: &str) -> ServiceResult<Vec<Calendar>> {
        Ok(self.calendars.find_by(ACCOUNT_ID, account_id)?)
    }

    /// Returns every account with its provider capabilities.
    pub fn entries(&self) -> ServiceResult<Vec<AccountEntry>> {
        Ok(self
            .all()?
            .into_iter()
            .map(|account| AccountEntry {
                provider: self
                    .config
                    .providers
                    .get(&account.provider_type)
                    .unwrap_or_default(),
                account,
            })
            .collect())
    }

    /// Validates and stores an account, then brings it up to date.
    ///
    /// A new account gets a fresh id. Syncing providers sync the account
    /// itself before this returns; its calendars start syncing in the
    /// background and are already counted as pending when it returns. Other
    /// providers get a default local calendar.
    pub async fn persist(&self, mut account: Account) -> ServiceResult<Account> {
        let provider = self
            .config
            .providers
            .get(&account.provider_type)
            .ok_or_else(|| ServiceError::UnknownProvider(account.provider_type.clone()))?;

        if account.id.is_empty() {
            if self.preset_in_use(&account.preset)? {
                return Err(ServiceError::invalid(
                    "account",
                    format!("preset {} already has an account", account.preset),
                ));
            }
            account.id = uuid::Uuid::new_v4().to_string();
        }
        self.accounts.put(&account.id, &account)?;
        tracing::info!(account = %account.id, provider = %account.provider_type, "account stored");

        if !provider.can_sync {
            self.ensure_local_calendar(&account)?;
            return Ok(account);
        }

        self.adapter.sync_account(&account).await?;
        for calendar in self.calendars(&account.id)? {
            tokio::spawn(self.sync.sync_calendar(account.clone(), calendar, None));
        }
        Ok(account)
    }

    /// Removes an account with its calendars and their events.
    ///
    /// Returns false if there was no such account.
    pub fn remove(&self, id: &str) -> ServiceResult<bool> {
        let events = self.store.collection::<CalendarEvent>(EVENTS);
        for calendar in self.calendars(id)? {
            for event in events.find_by(CALENDAR_ID, &calendar.id)? {
                events.remove(&event.id)?;
            }
            self.calendars.remove(&calendar.id)?;
        }
        let removed = self.accounts.remove(id)?;
        if removed {
            tracing::info!(account = %id, "account removed");
        }
        Ok(removed)
    }

    /// Filters out single-instance presets that already back an account.
    pub fn available_presets(&self, presets: Vec<String>) -> ServiceResult<Vec<String>> {
        let mut available = Vec::with_capacity(presets.len());
        for preset in presets {
            if !self.preset_in_use(&preset)? {
                available.push(preset);
            }
        }
        Ok(available)
    }

    /// Writes the account entries to `stream` now and after every change.
    ///
    /// Cancelling the stream detaches it from the store.
    pub fn observe(&self, stream: &StreamHandle) {
        let publish = {
            let this = self.clone();
            let stream = stream.clone();
            move || match this.entries() {
                Ok(entries) => {
                    stream.write(&entries);
                }
                Err(e) => tracing::warn!(error = %e, "could not list accounts"),
            }
        };

        let listener = self.store.listen(ACCOUNTS, {
            let publish = publish.clone();
            move |_| publish()
        });
        let store = self.store.clone();
        stream.on_cancel(move || {
            store.unlisten(listener);
        });
        publish();
    }

    fn preset_in_use(&self, preset: &str) -> ServiceResult<bool> {
        if !self.config.is_single_instance(preset) {
            return Ok(false);
        }
        Ok(!self.accounts.find_by("preset", preset)?.is_empty())
    }

    fn ensure_local_calendar(&self, account: &Account) -> ServiceResult<()> {
        if !self.calendars(&account.id)?.is_empty() {
            return Ok(());
        }
        let calendar = Calendar::new(
            format!("{}-local-first", account.id),
            account.id.clone(),
            "Offline calendar",
        );
        self.calendars.put(&calendar.id, &calendar)?;
        Ok(())
    }
}

impl fmt::Debug for Accounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accounts")
            .field("store", &self.store)
            .finish()
    }
}
