//! Expansion of recurring events into occurrences.

use crate::collections::EVENTS;
use async_trait::async_trait;
use calworker_bridge::{BoxError, Broadcaster, Subscription};
use calworker_protocol::{CalendarEvent, ExpandEvent, Value};
use calworker_store::{ChangeType, FeedListenerId, Store};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Computes the occurrences of one recurring event.
#[async_trait]
pub trait Expander: Send + Sync {
    /// Expands `event`, whose recurrence rule is set.
    async fn expand(&self, event: &CalendarEvent) -> Result<(), BoxError>;
}

/// Expander that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExpander;

#[async_trait]
impl Expander for NoopExpander {
    async fn expand(&self, _event: &CalendarEvent) -> Result<(), BoxError> {
        Ok(())
    }
}

struct RecurringInner {
    store: Store,
    expander: Arc<dyn Expander>,
    events: Broadcaster,
    listener: Mutex<Option<FeedListenerId>>,
    expansions: Arc<AtomicU64>,
}

/// Watches event writes and expands the recurring ones.
///
/// Each expansion is bracketed by `expandStart` and `expandComplete` on
/// [`RecurringEvents::events`]. Expansions run one at a time, in write order.
#[derive(Clone)]
pub struct RecurringEvents {
    inner: Arc<RecurringInner>,
}

impl RecurringEvents {
    /// Creates a watcher over `store`. Nothing is watched until `observe`.
    pub fn new(store: Store, expander: Arc<dyn Expander>) -> Self {
        Self {
            inner: Arc::new(RecurringInner {
                store,
                expander,
                events: Broadcaster::new(),
                listener: Mutex::new(None),
                expansions: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    /// Returns the broadcaster expansion events are emitted on.
    pub fn events(&self) -> &Broadcaster {
        &self.inner.events
    }

    /// Listens to one expansion event.
    pub fn on<F>(&self, event: ExpandEvent, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.events.on(event.name(), listener)
    }

    /// Starts watching. Returns false if already watching.
    ///
    /// Must be called from within a tokio runtime.
    pub fn observe(&self) -> bool {
        let mut listener = self.inner.listener.lock();
        if listener.is_some() {
            return false;
        }

        let (queue, pending) = mpsc::unbounded_channel();
        *listener = Some(self.inner.store.listen(EVENTS, move |change| {
            if change.change_type == ChangeType::Delete {
                return;
            }
            match serde_json::from_value::<CalendarEvent>(change.document.clone()) {
                Ok(event) if event.recurrence.is_some() => {
                    let _ = queue.send(event);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(event = %change.id, error = %e, "unreadable event"),
            }
        }));
        tokio::spawn(expand_loop(
            pending,
            Arc::clone(&self.inner.expander),
            self.inner.events.clone(),
            Arc::clone(&self.inner.expansions),
        ));
        tracing::debug!("watching recurring events");
        true
    }

    /// Stops watching. Returns false if not watching.
    pub fn stop(&self) -> bool {
        match self.inner.listener.lock().take() {
            Some(id) => self.inner.store.unlisten(id),
            None => false,
        }
    }

    /// Returns true while watching.
    pub fn is_observing(&self) -> bool {
        self.inner.listener.lock().is_some()
    }

    /// Returns how many expansions have finished.
    pub fn expansions(&self) -> u64 {
        self.inner.expansions.load(Ordering::SeqCst)
    }
}

// Ends once the store listener, and with it the queue's sender, is dropped.
async fn expand_loop(
    mut pending: mpsc::UnboundedReceiver<CalendarEvent>,
    expander: Arc<dyn Expander>,
    events: Broadcaster,
    expansions: Arc<AtomicU64>,
) {
    while let Some(event) = pending.recv().await {
        events.emit(ExpandEvent::Start.name(), &Value::Null);
        if let Err(e) = expander.expand(&event).await {
            tracing::warn!(event = %event.id, error = %e, "expansion failed");
        }
        expansions.fetch_add(1, Ordering::SeqCst);
        events.emit(ExpandEvent::Complete.name(), &Value::Null);
    }
}

impl fmt::Debug for RecurringEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecurringEvents")
            .field("observing", &self.is_observing())
            .field("expansions", &self.expansions())
            .finish()
    }
}
