//! Record lookup without the bridge.

use crate::error::ServiceResult;
use crate::records::Records;
use calworker_protocol::EventRecord;
use calworker_store::Store;

/// Reads display records straight from the store.
///
/// For callers that share an address space with the store and cannot wait
/// for a round trip through the worker. The store must already be loaded.
/// Prefer [`crate::CalendarClient::fetch_record`] everywhere else.
#[derive(Debug, Clone)]
pub struct DirectRecordLookup {
    records: Records,
}

impl DirectRecordLookup {
    /// Creates a lookup over `store`.
    pub fn new(store: &Store) -> Self {
        Self {
            records: Records::new(store),
        }
    }

    /// Fetches an event with its calendar and account.
    pub fn fetch_record(&self, event_id: &str) -> ServiceResult<EventRecord> {
        self.records.fetch(event_id)
    }
}
