//! The pending sync counter.

use calworker_bridge::Broadcaster;
use calworker_protocol::{SyncEvent, Value};
use parking_lot::ReentrantMutex;
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of sync units in flight.
///
/// Emits `syncStart` on the transition 0 → 1 and `syncComplete` on 1 → 0.
/// Events are emitted while the count is locked, so listeners observe the
/// transitions in the order they happened. The lock is reentrant: a listener
/// may start another sync from inside its callback.
pub struct PendingCounter {
    count: ReentrantMutex<Cell<u64>>,
    underflows: AtomicU64,
    events: Broadcaster,
}

impl PendingCounter {
    /// Creates a counter at zero that emits on `events`.
    pub fn new(events: Broadcaster) -> Self {
        Self {
            count: ReentrantMutex::new(Cell::new(0)),
            underflows: AtomicU64::new(0),
            events,
        }
    }

    /// Counts one more unit in flight.
    pub fn increment(&self) {
        let count = self.count.lock();
        let previous = count.get();
        count.set(previous + 1);
        tracing::trace!(pending = previous + 1, "sync unit started");
        if previous == 0 {
            self.emit(SyncEvent::Start);
        }
    }

    /// Counts one unit as finished.
    ///
    /// Decrementing at zero is a bookkeeping bug: it is logged, counted in
    /// [`PendingCounter::underflows`], and the count stays at zero.
    pub fn decrement(&self) {
        let count = self.count.lock();
        let previous = count.get();
        if previous == 0 {
            self.underflows.fetch_add(1, Ordering::SeqCst);
            tracing::error!("pending sync counter decremented below zero");
            return;
        }
        count.set(previous - 1);
        tracing::trace!(pending = previous - 1, "sync unit finished");
        if previous == 1 {
            self.emit(SyncEvent::Complete);
        }
    }

    /// Emits `event` if nothing is in flight. Returns whether it did.
    pub fn emit_if_idle(&self, event: SyncEvent) -> bool {
        let count = self.count.lock();
        if count.get() != 0 {
            return false;
        }
        self.emit(event);
        true
    }

    /// Returns the current count.
    pub fn get(&self) -> u64 {
        self.count.lock().get()
    }

    /// Returns how many decrements found the count at zero.
    pub fn underflows(&self) -> u64 {
        self.underflows.load(Ordering::SeqCst)
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        tracing::debug!(%event, "sync lifecycle");
        self.events.emit(event.name(), &Value::Null);
    }
}

impl fmt::Debug for PendingCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCounter")
            .field("count", &self.get())
            .field("underflows", &self.underflows())
            .finish()
    }
}
