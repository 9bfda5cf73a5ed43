//! Lifecycle event names broadcast from the worker.

use std::fmt;

/// Aggregate sync lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEvent {
    /// The number of pending sync units went from zero to one.
    Start,
    /// The number of pending sync units went back to zero.
    Complete,
    /// A full sync was requested while the device is offline.
    Offline,
}

impl SyncEvent {
    /// Every sync event, in relay order.
    pub const ALL: [SyncEvent; 3] = [SyncEvent::Start, SyncEvent::Complete, SyncEvent::Offline];

    /// Returns the broadcast name.
    pub fn name(self) -> &'static str {
        match self {
            SyncEvent::Start => "syncStart",
            SyncEvent::Complete => "syncComplete",
            SyncEvent::Offline => "syncOffline",
        }
    }

    /// Parses a broadcast name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.name() == name)
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Recurring event expansion lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpandEvent {
    /// Expansion of recurring events began.
    Start,
    /// Expansion of recurring events finished.
    Complete,
}

impl ExpandEvent {
    /// Every expansion event, in relay order.
    pub const ALL: [ExpandEvent; 2] = [ExpandEvent::Start, ExpandEvent::Complete];

    /// Returns the broadcast name.
    pub fn name(self) -> &'static str {
        match self {
            ExpandEvent::Start => "expandStart",
            ExpandEvent::Complete => "expandComplete",
        }
    }
}

impl fmt::Display for ExpandEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
