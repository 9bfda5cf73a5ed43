//! Collaborators that record what happened to them.

use calworker_bridge::{BridgeClient, Broadcaster};
use calworker_sync::{Connectivity, ErrorSink, SyncUnitError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error sink that keeps every error it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    errors: Mutex<Vec<SyncUnitError>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the errors received so far, in order.
    pub fn errors(&self) -> Vec<SyncUnitError> {
        self.errors.lock().clone()
    }

    /// Returns the number of errors received.
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    /// Returns true if no error was received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorSink for RecordingSink {
    fn dispatch(&self, error: SyncUnitError) {
        self.errors.lock().push(error);
    }
}

/// Connectivity whose state the test sets.
#[derive(Debug, Default)]
pub struct FixedConnectivity {
    offline: AtomicBool,
}

impl FixedConnectivity {
    /// Creates an online connectivity.
    pub fn online() -> Self {
        Self::default()
    }

    /// Creates an offline connectivity.
    pub fn offline() -> Self {
        Self {
            offline: AtomicBool::new(true),
        }
    }

    /// Changes the state.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl Connectivity for FixedConnectivity {
    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }
}

/// Ordered log of event names emitted on a broadcaster.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    names: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every emission of `names` on `events`.
    pub fn attach<'a>(&self, events: &Broadcaster, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            let log = Arc::clone(&self.names);
            let recorded = name.to_string();
            events.on(name, move |_| log.lock().push(recorded.clone()));
        }
    }

    /// Records every broadcast of `names` that reaches `client`.
    pub fn attach_client<'a>(&self, client: &BridgeClient, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            let log = Arc::clone(&self.names);
            let recorded = name.to_string();
            client.on(name, move |_| log.lock().push(recorded.clone()));
        }
    }

    /// Returns the recorded names.
    pub fn names(&self) -> Vec<String> {
        self.names.lock().clone()
    }

    /// Returns how many times `name` was recorded.
    pub fn count(&self, name: &str) -> usize {
        self.names.lock().iter().filter(|n| *n == name).count()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.names.lock().clear();
    }
}
