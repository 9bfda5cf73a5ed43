//! Publish/subscribe registry keyed by event name.
//!
//! Used on the UI side to fan broadcasts out to listeners, and on the worker
//! side by components (the sync orchestrator, recurring expansion) that emit
//! lifecycle events the service relays over the bridge.

use calworker_protocol::Value;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Callback invoked with an event's payload.
pub type EventListener = Arc<dyn Fn(&Value) + Send + Sync>;

struct Entry {
    id: u64,
    once: bool,
    listener: EventListener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    events: HashMap<String, Vec<Entry>>,
}

/// Named-event emitter.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct Broadcaster {
    registry: Arc<Mutex<Registry>>,
}

impl Broadcaster {
    /// Creates an emitter with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for every future emission of `event`.
    pub fn on<F>(&self, event: &str, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.add(event, false, Arc::new(listener))
    }

    /// Registers a listener for the next emission of `event` only.
    pub fn once<F>(&self, event: &str, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.add(event, true, Arc::new(listener))
    }

    fn add(&self, event: &str, once: bool, listener: EventListener) -> Subscription {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .events
            .entry(event.to_string())
            .or_default()
            .push(Entry { id, once, listener });
        Subscription {
            registry: Arc::downgrade(&self.registry),
            event: event.to_string(),
            id,
        }
    }

    /// Invokes every listener of `event` and returns how many ran.
    ///
    /// Listeners run outside the registry lock, so they may register or
    /// remove listeners (or emit) themselves.
    pub fn emit(&self, event: &str, data: &Value) -> usize {
        let listeners: Vec<EventListener> = {
            let mut registry = self.registry.lock();
            let Some(entries) = registry.events.get_mut(event) else {
                return 0;
            };
            let snapshot = entries.iter().map(|e| Arc::clone(&e.listener)).collect();
            entries.retain(|e| !e.once);
            if entries.is_empty() {
                registry.events.remove(event);
            }
            snapshot
        };

        tracing::trace!(event, listeners = listeners.len(), "emit");
        for listener in &listeners {
            listener(data);
        }
        listeners.len()
    }

    /// Returns the number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .lock()
            .events
            .get(event)
            .map_or(0, |entries| entries.len())
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("Broadcaster")
            .field("events", &registry.events.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Handle to one registered listener.
///
/// Dropping the handle leaves the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    event: String,
    id: u64,
}

impl Subscription {
    /// Returns the event name this listener is registered for.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Removes the listener. Returns false if it was already gone (a fired
    /// `once` listener, or an emitter that no longer exists).
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.lock();
        let Some(entries) = registry.events.get_mut(&self.event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != self.id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            registry.events.remove(&self.event);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Value) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move |_: &Value| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn on_receives_every_emission() {
        let events = Broadcaster::new();
        let (count, listener) = counter();
        events.on("syncStart", listener);

        assert_eq!(events.emit("syncStart", &Value::Null), 1);
        assert_eq!(events.emit("syncStart", &Value::Null), 1);
        assert_eq!(events.emit("syncComplete", &Value::Null), 0);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn once_fires_a_single_time() {
        let events = Broadcaster::new();
        let (count, listener) = counter();
        let sub = events.once("syncComplete", listener);

        events.emit("syncComplete", &Value::Null);
        events.emit("syncComplete", &Value::Null);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(events.listener_count("syncComplete"), 0);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let events = Broadcaster::new();
        let (count, listener) = counter();
        let sub = events.on("syncStart", listener);
        assert_eq!(sub.event(), "syncStart");
        assert!(sub.unsubscribe());

        events.emit("syncStart", &Value::Null);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_may_emit_reentrantly() {
        let events = Broadcaster::new();
        let (count, listener) = counter();
        events.on("syncComplete", listener);

        let inner = events.clone();
        events.on("syncStart", move |_| {
            inner.emit("syncComplete", &Value::Null);
        });

        events.emit("syncStart", &Value::Null);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn payload_is_passed_through() {
        let events = Broadcaster::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        events.on("expandStart", move |data| s.lock().push(data.clone()));

        events.emit("expandStart", &serde_json::json!({ "n": 1 }));
        assert_eq!(seen.lock().as_slice(), &[serde_json::json!({ "n": 1 })]);
    }
}
