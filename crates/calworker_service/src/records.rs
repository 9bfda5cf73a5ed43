//! Display records: an event with its calendar and account.

use crate::collections::{ACCOUNTS, CALENDARS, EVENTS};
use crate::error::ServiceResult;
use calworker_protocol::{Account, Calendar, CalendarEvent, EventRecord};
use calworker_store::{Store, TypedCollection};
use std::fmt;

/// Resolves event ids to [`EventRecord`]s.
#[derive(Clone)]
pub struct Records {
    events: TypedCollection<CalendarEvent>,
    calendars: TypedCollection<Calendar>,
    accounts: TypedCollection<Account>,
}

impl Records {
    pub(crate) fn new(store: &Store) -> Self {
        Self {
            events: store.collection(EVENTS),
            calendars: store.collection(CALENDARS),
            accounts: store.collection(ACCOUNTS),
        }
    }

    /// Fetches an event, its calendar and its account.
    ///
    /// Fails with a not-found error if any of the three is missing.
    pub fn fetch(&self, event_id: &str) -> ServiceResult<EventRecord> {
        let event = self.events.require(event_id)?;
        let calendar = self.calendars.require(&event.calendar_id)?;
        let account = self.accounts.require(&calendar.account_id)?;
        Ok(EventRecord {
            event,
            calendar,
            account,
        })
    }
}

impl fmt::Debug for Records {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Records").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{event, local, Harness};

    #[tokio::test]
    async fn fetch_joins_calendar_and_account() {
        let harness = Harness::loaded().await;
        let account = harness.accounts.persist(local()).await.unwrap();
        let calendar = harness.accounts.calendars(&account.id).unwrap().remove(0);
        let created = harness.events.create(event(&calendar.id, 0, 60)).unwrap();

        let record = harness.records.fetch(&created.id).unwrap();
        assert_eq!(record.event, created);
        assert_eq!(record.calendar, calendar);
        assert_eq!(record.account, account);

        assert!(harness.records.fetch("missing").unwrap_err().is_not_found());
    }
}
