//! Sync source backed by the store.

use crate::collections::{ACCOUNTS, ACCOUNT_ID, CALENDARS};
use crate::config::ProviderCatalog;
use async_trait::async_trait;
use calworker_protocol::{Account, Calendar};
use calworker_store::{Store, StoreError};
use calworker_sync::{SyncError, SyncResult, SyncSource};

/// Reads the accounts and calendars to sync from the store.
///
/// Accounts whose provider cannot sync are left out.
#[derive(Debug, Clone)]
pub struct StoreSyncSource {
    store: Store,
    providers: ProviderCatalog,
}

impl StoreSyncSource {
    /// Creates a source over `store`.
    pub fn new(store: Store, providers: ProviderCatalog) -> Self {
        Self { store, providers }
    }
}

fn source_error(err: StoreError) -> SyncError {
    SyncError::Source(err.to_string())
}

#[async_trait]
impl SyncSource for StoreSyncSource {
    async fn accounts(&self) -> SyncResult<Vec<Account>> {
        let accounts = self
            .store
            .collection::<Account>(ACCOUNTS)
            .all()
            .map_err(source_error)?;
        Ok(accounts
            .into_iter()
            .filter(|account| self.providers.can_sync(&account.provider_type))
            .collect())
    }

    async fn calendars(&self, account_id: &str) -> SyncResult<Vec<Calendar>> {
        self.store
            .collection::<Calendar>(CALENDARS)
            .find_by(ACCOUNT_ID, account_id)
            .map_err(source_error)
    }
}
