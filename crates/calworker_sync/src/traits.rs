//! Collaborators the orchestrator coordinates but does not implement.

use crate::error::{SyncResult, SyncUnitError};
use async_trait::async_trait;
use calworker_protocol::{Account, Calendar};

/// Supplies the accounts and calendars to sync.
#[async_trait]
pub trait SyncSource: Send + Sync {
    /// Returns every account.
    async fn accounts(&self) -> SyncResult<Vec<Account>>;

    /// Returns the calendars of one account.
    ///
    /// Called after the account itself synced, so it sees fresh data.
    async fn calendars(&self, account_id: &str) -> SyncResult<Vec<Calendar>>;
}

/// Performs the remote fetch-and-merge for one unit.
///
/// Retries, if any, are the adapter's business.
#[async_trait]
pub trait SyncAdapter: Send + Sync {
    /// Synchronizes an account's own data (calendar list, settings).
    async fn sync_account(&self, account: &Account) -> SyncResult<()>;

    /// Synchronizes one calendar's events.
    async fn sync_calendar(&self, account: &Account, calendar: &Calendar) -> SyncResult<()>;
}

/// Reports whether the device can reach the network.
pub trait Connectivity: Send + Sync {
    /// Returns true when offline.
    fn is_offline(&self) -> bool;
}

/// Receives sync failures nobody else handled.
pub trait ErrorSink: Send + Sync {
    /// Takes ownership of one failure.
    fn dispatch(&self, error: SyncUnitError);
}

/// Connectivity that is never offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_offline(&self) -> bool {
        false
    }
}

/// Error sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn dispatch(&self, error: SyncUnitError) {
        tracing::error!(unit = %error.unit, error = %error.source, "unhandled sync error");
    }
}
