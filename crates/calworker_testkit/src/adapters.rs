//! Sync adapters for tests.

use async_trait::async_trait;
use calworker_protocol::{Account, Calendar};
use calworker_sync::{SyncAdapter, SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Sync adapter whose failures and timing are scripted by the test.
///
/// Every sync is recorded, in the order it started. Ids listed with
/// [`ScriptedAdapter::fail_account`] or [`ScriptedAdapter::fail_calendar`]
/// fail with a server error; everything else succeeds after the configured
/// delay. While held, calendar syncs wait until released.
#[derive(Debug)]
pub struct ScriptedAdapter {
    failing: Mutex<HashSet<String>>,
    delay: Duration,
    held: watch::Sender<bool>,
    accounts: Mutex<Vec<String>>,
    calendars: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedAdapter {
    fn default() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            delay: Duration::ZERO,
            held: watch::channel(false).0,
            accounts: Mutex::new(Vec::new()),
            calendars: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl ScriptedAdapter {
    /// Creates an adapter where every sync succeeds at once.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes syncs of account `id` fail.
    pub fn fail_account(self, id: &str) -> Self {
        self.failing.lock().insert(id.to_string());
        self
    }

    /// Makes syncs of calendar `id` fail.
    pub fn fail_calendar(self, id: &str) -> Self {
        self.failing.lock().insert(id.to_string());
        self
    }

    /// Delays every sync by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Holds or releases calendar syncs.
    pub fn hold(&self, held: bool) {
        self.held.send_replace(held);
    }

    /// Returns the ids of the accounts synced so far.
    pub fn account_syncs(&self) -> Vec<String> {
        self.accounts.lock().clone()
    }

    /// Returns the ids of the calendars synced so far.
    pub fn calendar_syncs(&self) -> Vec<String> {
        self.calendars.lock().clone()
    }

    /// Returns the most syncs that were ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn run(&self, id: &str) -> SyncResult<()> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().contains(id) {
            return Err(SyncError::ServerError(format!("{id} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl SyncAdapter for ScriptedAdapter {
    async fn sync_account(&self, account: &Account) -> SyncResult<()> {
        self.accounts.lock().push(account.id.clone());
        self.run(&account.id).await
    }

    async fn sync_calendar(&self, _account: &Account, calendar: &Calendar) -> SyncResult<()> {
        self.calendars.lock().push(calendar.id.clone());
        let mut held = self.held.subscribe();
        // The sender lives as long as self, so this cannot fail.
        let _ = held.wait_for(|held| !*held).await;
        self.run(&calendar.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{caldav_account, calendar};

    #[tokio::test]
    async fn scripted_failures() {
        let adapter = ScriptedAdapter::new().fail_account("a2").fail_calendar("a1-c2");
        let a1 = caldav_account("a1");
        assert!(adapter.sync_account(&a1).await.is_ok());
        assert!(adapter.sync_account(&caldav_account("a2")).await.is_err());
        assert!(adapter.sync_calendar(&a1, &calendar("a1", 1)).await.is_ok());
        let err = adapter.sync_calendar(&a1, &calendar("a1", 2)).await.unwrap_err();
        assert_eq!(err, SyncError::ServerError("a1-c2 rejected".to_string()));
        assert_eq!(adapter.account_syncs(), ["a1", "a2"]);
        assert_eq!(adapter.calendar_syncs(), ["a1-c1", "a1-c2"]);
    }

    #[tokio::test]
    async fn held_calendars_wait_for_release() {
        let adapter = std::sync::Arc::new(ScriptedAdapter::new());
        adapter.hold(true);
        let task = tokio::spawn({
            let adapter = adapter.clone();
            async move {
                adapter
                    .sync_calendar(&caldav_account("a1"), &calendar("a1", 1))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());
        adapter.hold(false);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn delayed_syncs_overlap() {
        let adapter = ScriptedAdapter::new().with_delay(Duration::from_millis(20));
        let a1 = caldav_account("a1");
        let (c1, c2) = (calendar("a1", 1), calendar("a1", 2));
        let (first, second) = tokio::join!(
            adapter.sync_calendar(&a1, &c1),
            adapter.sync_calendar(&a1, &c2)
        );
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(adapter.max_in_flight(), 2);
    }
}
