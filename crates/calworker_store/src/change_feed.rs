//! Change feed for observing writes.
//!
//! Every successful `put` or `remove` produces one [`ChangeEvent`], handed to
//! the registered listeners. This is how the calendar service keeps `observe`
//! streams current.

use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Type of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Document was inserted (no previous version existed).
    Insert,
    /// Document was replaced.
    Update,
    /// Document was removed.
    Delete,
}

/// A single change event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Sequence number of the write.
    pub sequence: u64,
    /// Collection name.
    pub collection: String,
    /// Document id.
    pub id: String,
    /// Type of change.
    pub change_type: ChangeType,
    /// New document (for Insert/Update), the removed one for Delete.
    pub document: Value,
}

impl ChangeEvent {
    /// Creates an insert event.
    pub fn insert(sequence: u64, collection: &str, id: &str, document: Value) -> Self {
        Self::new(sequence, collection, id, ChangeType::Insert, document)
    }

    /// Creates an update event.
    pub fn update(sequence: u64, collection: &str, id: &str, document: Value) -> Self {
        Self::new(sequence, collection, id, ChangeType::Update, document)
    }

    /// Creates a delete event.
    pub fn delete(sequence: u64, collection: &str, id: &str, document: Value) -> Self {
        Self::new(sequence, collection, id, ChangeType::Delete, document)
    }

    fn new(
        sequence: u64,
        collection: &str,
        id: &str,
        change_type: ChangeType,
        document: Value,
    ) -> Self {
        Self {
            sequence,
            collection: collection.to_string(),
            id: id.to_string(),
            change_type,
            document,
        }
    }
}

/// Identifies a listener registered on a [`ChangeFeed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedListenerId(u64);

type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct Registration {
    id: FeedListenerId,
    collection: Option<String>,
    listener: Listener,
}

/// Distributes change events to listeners.
///
/// The change feed:
/// - Preserves write order within one collection
/// - Supports any number of listeners, optionally filtered by collection
/// - Calls listeners outside its locks, so a listener may read the store
pub struct ChangeFeed {
    listeners: RwLock<Vec<Registration>>,
    next_listener: AtomicU64,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Registers a listener for changes to `collection`, or to every
    /// collection when `None`.
    pub fn listen<F>(&self, collection: Option<&str>, listener: F) -> FeedListenerId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = FeedListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(Registration {
            id,
            collection: collection.map(str::to_string),
            listener: Arc::new(listener),
        });
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unlisten(&self, id: FeedListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|r| r.id != id);
        listeners.len() != before
    }

    /// Hands an event to matching listeners.
    pub fn emit(&self, event: ChangeEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .filter(|r| r.collection.as_deref().map_or(true, |c| c == event.collection))
            .map(|r| Arc::clone(&r.listener))
            .collect();
        tracing::trace!(
            collection = %event.collection,
            id = %event.id,
            change = ?event.change_type,
            listeners = listeners.len(),
            "change"
        );
        for listener in listeners {
            listener(&event);
        }
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
