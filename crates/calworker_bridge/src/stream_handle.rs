//! Service-side handle to one open stream.

use calworker_protocol::{CorrelationId, Envelope, Value};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

type Cleanup = Box<dyn FnOnce() + Send>;

struct HandleInner {
    id: CorrelationId,
    outbox: mpsc::UnboundedSender<Envelope>,
    cancelled: AtomicBool,
    cleanups: Mutex<Vec<Cleanup>>,
}

/// Writable end of a stream, handed to stream handlers.
///
/// Handlers push values with [`StreamHandle::write`] for as long as they
/// like, and register cleanup with [`StreamHandle::on_cancel`]. Once the
/// client cancels (or the session ends) writes are dropped and every cleanup
/// runs exactly once.
#[derive(Clone)]
pub struct StreamHandle {
    inner: Arc<HandleInner>,
}

impl StreamHandle {
    pub(crate) fn new(id: CorrelationId, outbox: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                outbox,
                cancelled: AtomicBool::new(false),
                cleanups: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the stream's correlation id.
    pub fn id(&self) -> CorrelationId {
        self.inner.id
    }

    /// Pushes one value to the client.
    ///
    /// Returns false if the value was not sent: the stream is cancelled, the
    /// session is gone, or the value could not be serialized.
    pub fn write<T: Serialize + ?Sized>(&self, value: &T) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(id = %self.inner.id, error = %e, "stream value not serializable");
                return false;
            }
        };
        self.write_value(value)
    }

    /// Pushes one already-encoded value to the client.
    pub fn write_value(&self, value: Value) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.inner
            .outbox
            .send(Envelope::Update {
                id: self.inner.id,
                value,
            })
            .is_ok()
    }

    /// Registers cleanup to run when the stream is cancelled.
    ///
    /// Runs `cleanup` immediately if the stream is already cancelled.
    pub fn on_cancel<F>(&self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut cleanups = self.inner.cleanups.lock();
            if !self.is_cancelled() {
                cleanups.push(Box::new(cleanup));
                return;
            }
        }
        cleanup();
    }

    /// Returns true once the stream is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Cancels the stream and runs its cleanups.
    ///
    /// Returns false if it was already cancelled.
    pub(crate) fn cancel(&self) -> bool {
        let cleanups = {
            let mut cleanups = self.inner.cleanups.lock();
            if self.inner.cancelled.swap(true, Ordering::SeqCst) {
                return false;
            }
            std::mem::take(&mut *cleanups)
        };
        tracing::debug!(id = %self.inner.id, cleanups = cleanups.len(), "stream cancelled");
        for cleanup in cleanups {
            cleanup();
        }
        true
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.inner.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn write_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = StreamHandle::new(CorrelationId::new(5), tx);

        assert!(handle.write(&vec!["a1"]));
        assert!(handle.cancel());
        assert!(!handle.write(&vec!["a2"]));

        let first = rx.try_recv().unwrap();
        assert_eq!(
            first,
            Envelope::Update {
                id: CorrelationId::new(5),
                value: serde_json::json!(["a1"]),
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cleanups_run_exactly_once() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = StreamHandle::new(CorrelationId::new(1), tx);
        let runs = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&runs);
        handle.on_cancel(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let r = Arc::clone(&runs);
        handle.on_cancel(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn write_fails_without_session() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = StreamHandle::new(CorrelationId::new(2), tx);
        assert!(!handle.write("x"));
        assert!(!handle.is_cancelled());
    }
}
