//! Calendar updates and observation.

use crate::collections::{ACCOUNTS, CALENDARS};
use crate::error::ServiceResult;
use calworker_bridge::StreamHandle;
use calworker_protocol::{Account, Calendar};
use calworker_store::{Store, TypedCollection};
use std::fmt;

/// Calendars across all accounts.
#[derive(Clone)]
pub struct Calendars {
    store: Store,
    calendars: TypedCollection<Calendar>,
    accounts: TypedCollection<Account>,
}

impl Calendars {
    pub(crate) fn new(store: Store) -> Self {
        Self {
            calendars: store.collection(CALENDARS),
            accounts: store.collection(ACCOUNTS),
            store,
        }
    }

    /// Returns every calendar, in id order.
    pub fn all(&self) -> ServiceResult<Vec<Calendar>> {
        Ok(self.calendars.all()?)
    }

    /// Stores a calendar. Its account must exist.
    pub fn update(&self, calendar: Calendar) -> ServiceResult<Calendar> {
        self.accounts.require(&calendar.account_id)?;
        self.calendars.put(&calendar.id, &calendar)?;
        Ok(calendar)
    }

    /// Writes the calendar list to `stream` now and after every change.
    pub fn observe(&self, stream: &StreamHandle) {
        let publish = {
            let this = self.clone();
            let stream = stream.clone();
            move || match this.all() {
                Ok(calendars) => {
                    stream.write(&calendars);
                }
                Err(e) => tracing::warn!(error = %e, "could not list calendars"),
            }
        };

        let listener = self.store.listen(CALENDARS, {
            let publish = publish.clone();
            move |_| publish()
        });
        let store = self.store.clone();
        stream.on_cancel(move || {
            store.unlisten(listener);
        });
        publish();
    }
}

impl fmt::Debug for Calendars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Calendars").finish_non_exhaustive()
    }
}
