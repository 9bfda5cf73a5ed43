//! Client-side handle to one subscription.

use crate::client::Connection;
use calworker_protocol::{CorrelationId, Endpoint, Envelope, Value};
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Callback invoked with each update of a stream.
pub type UpdateListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identifies a listener attached to a [`ClientStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct StreamState {
    next_listener: u64,
    listeners: Vec<(ListenerId, UpdateListener)>,
    has_listened: bool,
    backlog: VecDeque<Value>,
}

/// State shared between a stream handle and the connection's reader.
pub(crate) struct StreamShared {
    id: CorrelationId,
    endpoint: Endpoint,
    buffer_early: bool,
    cancelled: AtomicBool,
    /// Held while listeners run; `stop` takes it to wait out a delivery in
    /// progress. Reentrant so a listener may stop its own stream.
    delivery: ReentrantMutex<()>,
    state: Mutex<StreamState>,
}

impl StreamShared {
    pub(crate) fn new(id: CorrelationId, endpoint: Endpoint, buffer_early: bool) -> Self {
        Self {
            id,
            endpoint,
            buffer_early,
            cancelled: AtomicBool::new(false),
            delivery: ReentrantMutex::new(()),
            state: Mutex::new(StreamState::default()),
        }
    }

    pub(crate) fn id(&self) -> CorrelationId {
        self.id
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Hands one update to the current listeners, in registration order.
    pub(crate) fn deliver(&self, value: Value) {
        let _delivery = self.delivery.lock();
        if self.is_cancelled() {
            return;
        }
        let listeners: Vec<UpdateListener> = {
            let mut state = self.state.lock();
            if state.listeners.is_empty() {
                if self.buffer_early && !state.has_listened {
                    state.backlog.push_back(value);
                } else {
                    tracing::trace!(id = %self.id, "update with no listener dropped");
                }
                return;
            }
            state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            if self.is_cancelled() {
                break;
            }
            listener(&value);
        }
    }

    fn listen(&self, listener: UpdateListener) -> ListenerId {
        let _delivery = self.delivery.lock();
        let (id, backlog) = {
            let mut state = self.state.lock();
            state.next_listener += 1;
            let id = ListenerId(state.next_listener);
            if self.is_cancelled() {
                return id;
            }
            state.listeners.push((id, Arc::clone(&listener)));
            state.has_listened = true;
            (id, std::mem::take(&mut state.backlog))
        };
        for value in backlog {
            if self.is_cancelled() {
                break;
            }
            listener(&value);
        }
        id
    }

    fn unlisten(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(l, _)| *l != id);
        state.listeners.len() != before
    }

    /// Stops delivery for good. Returns true for the call that stopped it.
    ///
    /// On return no listener of this stream is running or will run again.
    pub(crate) fn stop(&self) -> bool {
        let first = !self.cancelled.swap(true, Ordering::SeqCst);
        let _delivery = self.delivery.lock();
        if first {
            let mut state = self.state.lock();
            state.listeners.clear();
            state.backlog.clear();
        }
        first
    }
}

/// Handle to an open subscription.
///
/// Updates go to every attached listener in arrival order. Updates that
/// arrive before the first listener is attached are kept and replayed to it
/// (see [`crate::ClientConfig::buffer_early_updates`]).
///
/// A stream ends when it is cancelled, when the service reports a handler
/// failure for it, or when the channel is lost. All three look the same to a
/// listener: updates simply stop.
#[derive(Clone)]
pub struct ClientStream {
    shared: Arc<StreamShared>,
    connection: Arc<Connection>,
}

impl ClientStream {
    pub(crate) fn new(shared: Arc<StreamShared>, connection: Arc<Connection>) -> Self {
        Self { shared, connection }
    }

    /// Returns the subscription's correlation id.
    pub fn id(&self) -> CorrelationId {
        self.shared.id
    }

    /// Returns the endpoint this stream was opened on.
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    /// Attaches a listener.
    pub fn listen<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.shared.listen(Arc::new(listener))
    }

    /// Detaches a listener. Returns false if it was not attached.
    pub fn unlisten(&self, id: ListenerId) -> bool {
        self.shared.unlisten(id)
    }

    /// Attaches a listener that forwards updates into a channel.
    ///
    /// The channel ends when the stream ends.
    pub fn listen_channel(&self) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = Mutex::new(Some(tx));
        self.listen(move |value| {
            let mut sender = sender.lock();
            if let Some(tx) = sender.as_ref() {
                if tx.send(value.clone()).is_err() {
                    sender.take();
                }
            }
        });
        rx
    }

    /// Returns true once the stream has ended.
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Cancels the subscription.
    ///
    /// Idempotent. When this returns no listener runs again, including for
    /// updates already in flight.
    pub async fn cancel(&self) {
        if !self.shared.stop() {
            return;
        }
        let id = self.shared.id;
        self.connection.forget_stream(id);
        tracing::debug!(%id, endpoint = %self.shared.endpoint, "cancel");
        if let Err(e) = self.connection.write(Envelope::Cancel { id }).await {
            tracing::debug!(%id, error = %e, "cancel not sent");
        }
    }
}

impl fmt::Debug for ClientStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientStream")
            .field("id", &self.shared.id)
            .field("endpoint", &self.shared.endpoint)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn shared(buffer_early: bool) -> StreamShared {
        StreamShared::new(CorrelationId::new(1), Endpoint::from("accounts/observe"), buffer_early)
    }

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, UpdateListener) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        (seen, Arc::new(move |v: &Value| s.lock().push(v.clone())))
    }

    #[test]
    fn early_updates_flush_to_first_listener() {
        let stream = shared(true);
        stream.deliver(Value::from(1));
        stream.deliver(Value::from(2));

        let (seen, listener) = recorder();
        stream.listen(listener);
        stream.deliver(Value::from(3));
        assert_eq!(
            *seen.lock(),
            vec![Value::from(1), Value::from(2), Value::from(3)]
        );
    }

    #[test]
    fn early_updates_dropped_when_buffering_is_off() {
        let stream = shared(false);
        stream.deliver(Value::from(1));
        let (seen, listener) = recorder();
        stream.listen(listener);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn only_the_first_listener_gets_the_backlog() {
        let stream = shared(true);
        stream.deliver(Value::from(1));
        let (first, l1) = recorder();
        let id = stream.listen(l1);
        assert!(stream.unlisten(id));
        assert!(!stream.unlisten(id));

        stream.deliver(Value::from(2));
        let (second, l2) = recorder();
        stream.listen(l2);
        assert_eq!(first.lock().len(), 1);
        assert!(second.lock().is_empty());
    }

    #[test]
    fn stop_suppresses_further_updates() {
        let stream = shared(true);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        stream.listen(Arc::new(move |_: &Value| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        stream.deliver(Value::Null);
        assert!(stream.stop());
        assert!(!stream.stop());
        stream.deliver(Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_stop_its_own_stream() {
        let stream = Arc::new(shared(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let (s, c) = (Arc::downgrade(&stream), Arc::clone(&calls));
        stream.listen(Arc::new(move |_: &Value| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(stream) = s.upgrade() {
                stream.stop();
            }
        }));
        let (seen, second) = recorder();
        stream.listen(second);

        stream.deliver(Value::Null);
        stream.deliver(Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(seen.lock().is_empty());
    }
}
