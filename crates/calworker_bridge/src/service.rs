//! Service side of the bridge: endpoint registry, dispatch loop, broadcast.

use crate::error::{BoxError, BridgeError, BridgeResult};
use crate::stream_handle::StreamHandle;
use crate::transport::Transport;
use calworker_protocol::{Args, CorrelationId, Endpoint, Envelope, Value};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Result type returned by handlers.
///
/// Any error type converts with `?`; its message becomes the error reply.
pub type HandlerResult<T> = Result<T, BoxError>;

type MethodHandler = Arc<dyn Fn(Args) -> BoxFuture<'static, HandlerResult<Value>> + Send + Sync>;
type StreamHandler =
    Arc<dyn Fn(StreamHandle, Args) -> BoxFuture<'static, HandlerResult<()>> + Send + Sync>;

/// Live requests of one session, keyed by the client's correlation ids.
#[derive(Default)]
struct Session {
    calls: HashSet<CorrelationId>,
    streams: HashMap<CorrelationId, StreamHandle>,
}

impl Session {
    fn is_live(&self, id: CorrelationId) -> bool {
        self.calls.contains(&id) || self.streams.contains_key(&id)
    }
}

/// Dispatches calls and subscriptions to registered handlers.
///
/// One service may serve any number of sessions (one per transport passed to
/// [`BridgeService::serve`]). Handlers run as independent tasks, so a slow
/// handler never delays dispatch of the next message.
pub struct BridgeService {
    name: String,
    methods: RwLock<HashMap<Endpoint, MethodHandler>>,
    streams: RwLock<HashMap<Endpoint, StreamHandler>>,
    sessions: Mutex<HashMap<u64, mpsc::UnboundedSender<Envelope>>>,
    next_session: AtomicU64,
}

impl BridgeService {
    /// Creates a service with no endpoints.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: RwLock::new(HashMap::new()),
            streams: RwLock::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
        }
    }

    /// Returns the service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a method handler.
    ///
    /// The handler's value is serialized into the result reply; an error (or a
    /// panic) becomes an error reply for that call only.
    ///
    /// Registering the same endpoint twice is a programming error: it asserts
    /// in debug builds and is logged and rejected otherwise.
    pub fn register_method<F, Fut, T>(
        &self,
        endpoint: impl Into<Endpoint>,
        handler: F,
    ) -> BridgeResult<()>
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<T>> + Send + 'static,
        T: Serialize,
    {
        let handler: MethodHandler = Arc::new(move |args| {
            let reply = handler(args);
            Box::pin(async move {
                let value = reply.await?;
                Ok(serde_json::to_value(value)?)
            })
        });
        register(&self.methods, "method", endpoint.into(), handler)
    }

    /// Registers a stream handler.
    ///
    /// The handler gets a [`StreamHandle`] to write updates and install
    /// cancellation cleanup. Returning `Ok` leaves the stream open; returning
    /// an error sends an error reply and cancels the stream.
    pub fn register_stream<F, Fut>(&self, endpoint: impl Into<Endpoint>, handler: F) -> BridgeResult<()>
    where
        F: Fn(StreamHandle, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        let handler: StreamHandler = Arc::new(move |stream, args| Box::pin(handler(stream, args)));
        register(&self.streams, "stream", endpoint.into(), handler)
    }

    /// Returns true if a method is registered under `endpoint`.
    pub fn has_method(&self, endpoint: &str) -> bool {
        self.methods.read().contains_key(endpoint)
    }

    /// Returns true if a stream is registered under `endpoint`.
    pub fn has_stream(&self, endpoint: &str) -> bool {
        self.streams.read().contains_key(endpoint)
    }

    /// Returns the number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Sends a one-way event to every live session. Returns how many got it.
    pub fn broadcast(&self, event: &str, data: Value) -> usize {
        let sessions = self.sessions.lock();
        let delivered = sessions
            .values()
            .filter(|outbox| outbox.send(Envelope::broadcast(event, data.clone())).is_ok())
            .count();
        tracing::debug!(service = %self.name, event, sessions = delivered, "broadcast");
        delivered
    }

    /// Serves one session until the channel closes.
    ///
    /// On return every stream opened on this session has been cancelled, and
    /// replies still in flight are dropped.
    pub async fn serve(self: &Arc<Self>, transport: Arc<dyn Transport>) -> BridgeResult<()> {
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (outbox, mut outgoing) = mpsc::unbounded_channel::<Envelope>();
        self.sessions.lock().insert(session_id, outbox.clone());
        tracing::debug!(service = %self.name, session = session_id, "session opened");

        let writer = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                while let Some(envelope) = outgoing.recv().await {
                    if let Err(e) = transport.write_message(envelope).await {
                        tracing::warn!(error = %e, "session writer stopped");
                        break;
                    }
                }
            })
        };

        let session = Arc::new(Mutex::new(Session::default()));
        let outcome = loop {
            match transport.read_message().await {
                Ok(Some(envelope)) => self.dispatch(&session, &outbox, envelope),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.sessions.lock().remove(&session_id);
        let streams: Vec<StreamHandle> = session.lock().streams.drain().map(|(_, s)| s).collect();
        let open_streams = streams.len();
        for stream in streams {
            stream.cancel();
        }
        writer.abort();
        if let Err(e) = transport.close().await {
            tracing::debug!(error = %e, "closing session transport");
        }
        tracing::debug!(
            service = %self.name,
            session = session_id,
            open_streams,
            "session closed"
        );
        outcome
    }

    /// Spawns [`BridgeService::serve`] on the current runtime.
    pub fn spawn(self: &Arc<Self>, transport: Arc<dyn Transport>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = service.serve(transport).await {
                tracing::warn!(service = %service.name, error = %e, "session ended with error");
            }
        })
    }

    fn dispatch(
        &self,
        session: &Arc<Mutex<Session>>,
        outbox: &mpsc::UnboundedSender<Envelope>,
        envelope: Envelope,
    ) {
        match envelope {
            Envelope::Call { id, endpoint, args } => {
                self.dispatch_call(session, outbox, id, endpoint, args)
            }
            Envelope::Subscribe { id, endpoint, args } => {
                self.dispatch_subscribe(session, outbox, id, endpoint, args)
            }
            Envelope::Cancel { id } => {
                let stream = session.lock().streams.remove(&id);
                match stream {
                    Some(stream) => {
                        stream.cancel();
                    }
                    None => tracing::debug!(%id, "cancel for a stream that is not open"),
                }
            }
            other => {
                tracing::error!(kind = other.kind(), "client sent a reply envelope, ignored");
            }
        }
    }

    fn dispatch_call(
        &self,
        session: &Arc<Mutex<Session>>,
        outbox: &mpsc::UnboundedSender<Envelope>,
        id: CorrelationId,
        endpoint: Endpoint,
        args: Args,
    ) {
        if reuses_live_id(&session.lock(), id) {
            return;
        }
        let Some(handler) = self.methods.read().get(&endpoint).cloned() else {
            tracing::warn!(%id, %endpoint, "call to unknown method");
            let _ = outbox.send(Envelope::error(id, format!("unknown method: {endpoint}")));
            return;
        };
        if !claim(session, id, |s| {
            s.calls.insert(id);
        }) {
            return;
        }

        tracing::debug!(%id, %endpoint, "call");
        let session = Arc::clone(session);
        let outbox = outbox.clone();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(async move { handler(args).await })
                .catch_unwind()
                .await;
            let reply = match outcome {
                Ok(Ok(value)) => Envelope::Result { id, value },
                Ok(Err(e)) => {
                    tracing::debug!(%id, %endpoint, error = %e, "method failed");
                    Envelope::error(id, e.to_string())
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(%id, %endpoint, %message, "method panicked");
                    Envelope::error(id, message)
                }
            };
            session.lock().calls.remove(&id);
            let _ = outbox.send(reply);
        });
    }

    fn dispatch_subscribe(
        &self,
        session: &Arc<Mutex<Session>>,
        outbox: &mpsc::UnboundedSender<Envelope>,
        id: CorrelationId,
        endpoint: Endpoint,
        args: Args,
    ) {
        if reuses_live_id(&session.lock(), id) {
            return;
        }
        let Some(handler) = self.streams.read().get(&endpoint).cloned() else {
            tracing::warn!(%id, %endpoint, "subscribe to unknown stream");
            let _ = outbox.send(Envelope::error(id, format!("unknown stream: {endpoint}")));
            return;
        };
        let stream = StreamHandle::new(id, outbox.clone());
        if !claim(session, id, |s| {
            s.streams.insert(id, stream.clone());
        }) {
            return;
        }

        tracing::debug!(%id, %endpoint, "subscribe");
        let session = Arc::clone(session);
        let outbox = outbox.clone();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(async move { handler(stream, args).await })
                .catch_unwind()
                .await;
            let failure = match outcome {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            tracing::warn!(%id, %endpoint, error = %failure, "stream handler failed");
            let stream = session.lock().streams.remove(&id);
            if let Some(stream) = stream {
                stream.cancel();
                let _ = outbox.send(Envelope::error(id, failure));
            }
        });
    }
}

impl fmt::Debug for BridgeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeService")
            .field("name", &self.name)
            .field("methods", &self.methods.read().len())
            .field("streams", &self.streams.read().len())
            .field("sessions", &self.session_count())
            .finish()
    }
}

fn register<H>(
    table: &RwLock<HashMap<Endpoint, H>>,
    role: &'static str,
    endpoint: Endpoint,
    handler: H,
) -> BridgeResult<()> {
    let mut table = table.write();
    let duplicate = table.contains_key(&endpoint);
    if duplicate {
        tracing::error!(role, %endpoint, "endpoint registered twice");
    }
    debug_assert!(!duplicate, "{role} endpoint registered twice: {endpoint}");
    if duplicate {
        return Err(BridgeError::DuplicateEndpoint {
            role,
            endpoint: endpoint.to_string(),
        });
    }
    table.insert(endpoint, handler);
    Ok(())
}

/// Marks `id` live on the session. A request reusing a live id is logged and
/// dropped; no reply is sent since it would be routed to the original request.
// Checked before the endpoint is resolved: any reply to a reused id would be
// routed to the request that still owns it.
fn reuses_live_id(session: &Session, id: CorrelationId) -> bool {
    if session.is_live(id) {
        tracing::error!(%id, "request reuses a live correlation id, ignored");
        return true;
    }
    false
}

fn claim(session: &Mutex<Session>, id: CorrelationId, insert: impl FnOnce(&mut Session)) -> bool {
    let mut session = session.lock();
    if reuses_live_id(&session, id) {
        return false;
    }
    insert(&mut session);
    true
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("handler panicked: {detail}"),
        None => "handler panicked".to_string(),
    }
}
