//! Event creation, update and removal.

use crate::collections::{CALENDARS, EVENTS};
use crate::error::{ServiceError, ServiceResult};
use calworker_protocol::{Calendar, CalendarEvent};
use calworker_store::{Store, TypedCollection};
use std::fmt;

/// Events across all calendars.
#[derive(Clone)]
pub struct Events {
    events: TypedCollection<CalendarEvent>,
    calendars: TypedCollection<Calendar>,
}

impl Events {
    pub(crate) fn new(store: &Store) -> Self {
        Self {
            events: store.collection(EVENTS),
            calendars: store.collection(CALENDARS),
        }
    }

    /// Stores a new event. A missing id is generated.
    pub fn create(&self, mut event: CalendarEvent) -> ServiceResult<CalendarEvent> {
        self.validate(&event)?;
        if event.id.is_empty() {
            event.id = uuid::Uuid::new_v4().to_string();
        }
        self.events.put(&event.id, &event)?;
        tracing::debug!(event = %event.id, calendar = %event.calendar_id, "event created");
        Ok(event)
    }

    /// Replaces an existing event.
    pub fn update(&self, event: CalendarEvent) -> ServiceResult<CalendarEvent> {
        self.validate(&event)?;
        self.events.require(&event.id)?;
        self.events.put(&event.id, &event)?;
        Ok(event)
    }

    /// Removes an event. Returns false if it did not exist.
    pub fn remove(&self, event: &CalendarEvent) -> ServiceResult<bool> {
        Ok(self.events.remove(&event.id)?)
    }

    fn validate(&self, event: &CalendarEvent) -> ServiceResult<()> {
        if event.end < event.start {
            return Err(ServiceError::invalid("event", "ends before it starts"));
        }
        self.calendars.require(&event.calendar_id)?;
        Ok(())
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events").finish_non_exhaustive()
    }
}
