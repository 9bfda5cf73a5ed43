//! UI-side view of the worker's sync lifecycle.

use calworker_bridge::{BridgeClient, Broadcaster, Subscription};
use calworker_protocol::{SyncEvent, Value};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Re-emits the worker's `syncStart`, `syncComplete` and `syncOffline`
/// broadcasts on a local broadcaster and tracks whether a sync is running.
pub struct SyncStatusListener {
    events: Broadcaster,
    syncing: Arc<AtomicBool>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SyncStatusListener {
    /// Creates a listener that is not attached to any client.
    pub fn new() -> Self {
        Self {
            events: Broadcaster::new(),
            syncing: Arc::new(AtomicBool::new(false)),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Attaches to the broadcasts of `client`. Returns false if already
    /// attached.
    pub fn observe(&self, client: &BridgeClient) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.is_empty() {
            return false;
        }
        for event in SyncEvent::ALL {
            let events = self.events.clone();
            let syncing = Arc::clone(&self.syncing);
            subscriptions.push(client.on(event.name(), move |data: &Value| {
                match event {
                    SyncEvent::Start => syncing.store(true, Ordering::SeqCst),
                    SyncEvent::Complete => syncing.store(false, Ordering::SeqCst),
                    SyncEvent::Offline => {}
                }
                events.emit(event.name(), data);
            }));
        }
        true
    }

    /// Detaches from the client. Returns false if not attached.
    pub fn stop(&self) -> bool {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        let attached = !subscriptions.is_empty();
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        attached
    }

    /// Listens to one lifecycle event.
    pub fn on<F>(&self, event: SyncEvent, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.events.on(event.name(), listener)
    }

    /// Returns true between `syncStart` and the next `syncComplete`.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }
}

impl Default for SyncStatusListener {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SyncStatusListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncStatusListener")
            .field("syncing", &self.is_syncing())
            .field("attached", &!self.subscriptions.lock().is_empty())
            .finish()
    }
}
