//! Client side of the bridge.

use crate::broadcast::{Broadcaster, Subscription};
use crate::client_stream::{ClientStream, StreamShared};
use crate::config::ClientConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::transport::{Connector, Transport};
use calworker_protocol::{Args, CorrelationId, CorrelationIdAllocator, Endpoint, Envelope, Value};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, OnceCell};
use tokio::task::JoinHandle;

type Reply = oneshot::Sender<BridgeResult<Value>>;

/// One established channel with its routing tables.
pub(crate) struct Connection {
    transport: Arc<dyn Transport>,
    ids: CorrelationIdAllocator,
    pending: Mutex<HashMap<CorrelationId, Reply>>,
    streams: Mutex<HashMap<CorrelationId, Arc<StreamShared>>>,
    closed: AtomicBool,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            ids: CorrelationIdAllocator::new(),
            pending: Mutex::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            reader: Mutex::new(None),
        }
    }

    pub(crate) async fn write(&self, envelope: Envelope) -> BridgeResult<()> {
        self.transport.write_message(envelope).await
    }

    fn register_call(&self, id: CorrelationId, reply: Reply) -> BridgeResult<()> {
        let mut pending = self.pending.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::transport("channel closed"));
        }
        pending.insert(id, reply);
        Ok(())
    }

    fn register_stream(&self, stream: Arc<StreamShared>) -> BridgeResult<()> {
        let mut streams = self.streams.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::transport("channel closed"));
        }
        streams.insert(stream.id(), stream);
        Ok(())
    }

    pub(crate) fn forget_stream(&self, id: CorrelationId) {
        self.streams.lock().remove(&id);
    }

    fn route(&self, envelope: Envelope, broadcasts: &Broadcaster) {
        match envelope {
            Envelope::Result { id, value } => {
                let reply = self.pending.lock().remove(&id);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(Ok(value));
                    }
                    None => tracing::warn!(%id, "result for unknown call dropped"),
                }
            }
            Envelope::Error { id, message } => {
                let reply = self.pending.lock().remove(&id);
                if let Some(reply) = reply {
                    let _ = reply.send(Err(BridgeError::Remote(message)));
                    return;
                }
                let stream = self.streams.lock().remove(&id);
                match stream {
                    Some(stream) => {
                        tracing::warn!(%id, error = %message, "stream closed by service");
                        stream.stop();
                    }
                    None => tracing::warn!(%id, error = %message, "error for unknown request"),
                }
            }
            Envelope::Update { id, value } => {
                let stream = self.streams.lock().get(&id).cloned();
                match stream {
                    Some(stream) => stream.deliver(value),
                    None => tracing::trace!(%id, "update for closed stream dropped"),
                }
            }
            Envelope::Broadcast { event, data } => {
                broadcasts.emit(&event, &data);
            }
            other => {
                tracing::error!(kind = other.kind(), "service sent a request envelope, ignored");
            }
        }
    }

    /// Rejects every pending call and ends every open stream.
    fn shutdown(&self, reason: &str) {
        let pending: Vec<Reply> = {
            let mut pending = self.pending.lock();
            self.closed.store(true, Ordering::SeqCst);
            pending.drain().map(|(_, reply)| reply).collect()
        };
        let streams: Vec<Arc<StreamShared>> = self
            .streams
            .lock()
            .drain()
            .map(|(_, stream)| stream)
            .collect();
        if !pending.is_empty() || !streams.is_empty() {
            tracing::debug!(
                reason,
                pending = pending.len(),
                streams = streams.len(),
                "connection shut down"
            );
        }
        for reply in pending {
            let _ = reply.send(Err(BridgeError::transport(reason)));
        }
        for stream in streams {
            stream.stop();
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &self.transport)
            .field("pending", &self.pending.lock().len())
            .field("streams", &self.streams.lock().len())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

async fn read_loop(connection: Arc<Connection>, broadcasts: Broadcaster, service: String) {
    let reason = loop {
        match connection.transport.read_message().await {
            Ok(Some(envelope)) => connection.route(envelope, &broadcasts),
            Ok(None) => break "channel closed".to_string(),
            Err(e) => {
                tracing::warn!(service = %service, error = %e, "read failed");
                break e.to_string();
            }
        }
    };
    tracing::debug!(service = %service, %reason, "reader stopped");
    connection.shutdown(&reason);
}

struct ClientInner {
    config: ClientConfig,
    connector: Box<dyn Connector>,
    connection: OnceCell<Arc<Connection>>,
    closing: AtomicBool,
    broadcasts: Broadcaster,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.get() {
            if let Some(reader) = connection.reader.lock().take() {
                reader.abort();
            }
            connection.shutdown("client dropped");
        }
    }
}

/// Client end of the bridge.
///
/// The channel is established on first use through the [`Connector`] and
/// shared by every clone of the client. If establishing it fails the error is
/// returned and the next call tries again. Once an established channel is
/// lost, every pending call fails with [`BridgeError::Transport`], open
/// streams end silently, and later calls fail the same way.
#[derive(Clone)]
pub struct BridgeClient {
    inner: Arc<ClientInner>,
}

impl BridgeClient {
    /// Creates a client with the default configuration.
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::with_config(ClientConfig::default(), connector)
    }

    /// Creates a client with the given configuration.
    pub fn with_config(config: ClientConfig, connector: impl Connector + 'static) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                connector: Box::new(connector),
                connection: OnceCell::new(),
                closing: AtomicBool::new(false),
                broadcasts: Broadcaster::new(),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    async fn connection(&self) -> BridgeResult<Arc<Connection>> {
        if self.inner.closing.load(Ordering::SeqCst) {
            return Err(BridgeError::transport("client closed"));
        }
        let connection = self
            .inner
            .connection
            .get_or_try_init(|| async {
                let service = self.inner.config.service_name.clone();
                let transport = self.inner.connector.connect().await.map_err(|e| {
                    tracing::error!(service = %service, error = %e, "connect failed");
                    e
                })?;
                let connection = Arc::new(Connection::new(transport));
                let reader = tokio::spawn(read_loop(
                    Arc::clone(&connection),
                    self.inner.broadcasts.clone(),
                    service.clone(),
                ));
                *connection.reader.lock() = Some(reader);
                tracing::info!(service = %service, "connected");
                Ok::<_, BridgeError>(connection)
            })
            .await?;
        Ok(Arc::clone(connection))
    }

    /// Invokes a method and waits for its reply.
    ///
    /// Fails with [`BridgeError::Remote`] if the handler failed and with
    /// [`BridgeError::Transport`] if the channel is unavailable or lost.
    pub async fn call(&self, endpoint: impl Into<Endpoint>, args: Args) -> BridgeResult<Value> {
        let endpoint = endpoint.into();
        let connection = self.connection().await?;
        let id = connection.ids.next_id();
        let (reply, outcome) = oneshot::channel();
        connection.register_call(id, reply)?;

        tracing::debug!(%id, %endpoint, "call");
        if let Err(e) = connection.write(Envelope::call(id, endpoint, args)).await {
            connection.pending.lock().remove(&id);
            return Err(e);
        }
        outcome
            .await
            .unwrap_or_else(|_| Err(BridgeError::transport("connection dropped")))
    }

    /// Invokes a method and decodes its reply.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        endpoint: impl Into<Endpoint>,
        args: Args,
    ) -> BridgeResult<T> {
        let value = self.call(endpoint, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Opens a stream.
    ///
    /// Returns once the request is sent; a handler failure arrives later and
    /// ends the stream.
    pub async fn subscribe(
        &self,
        endpoint: impl Into<Endpoint>,
        args: Args,
    ) -> BridgeResult<ClientStream> {
        let endpoint = endpoint.into();
        let connection = self.connection().await?;
        let id = connection.ids.next_id();
        let shared = Arc::new(StreamShared::new(
            id,
            endpoint.clone(),
            self.inner.config.buffer_early_updates,
        ));
        connection.register_stream(Arc::clone(&shared))?;

        tracing::debug!(%id, %endpoint, "subscribe");
        if let Err(e) = connection.write(Envelope::subscribe(id, endpoint, args)).await {
            connection.forget_stream(id);
            shared.stop();
            return Err(e);
        }
        Ok(ClientStream::new(shared, connection))
    }

    /// Listens to a broadcast event.
    pub fn on<F>(&self, event: &str, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.broadcasts.on(event, listener)
    }

    /// Listens to the next occurrence of a broadcast event.
    pub fn once<F>(&self, event: &str, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.broadcasts.once(event, listener)
    }

    /// Returns the number of calls waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.inner
            .connection
            .get()
            .map_or(0, |connection| connection.pending.lock().len())
    }

    /// Returns the number of open streams.
    pub fn open_streams(&self) -> usize {
        self.inner
            .connection
            .get()
            .map_or(0, |connection| connection.streams.lock().len())
    }

    /// Returns true while an established channel is usable.
    pub fn is_connected(&self) -> bool {
        self.inner
            .connection
            .get()
            .is_some_and(|connection| !connection.closed.load(Ordering::SeqCst))
    }

    /// Closes the channel.
    ///
    /// Pending calls fail with a transport error, streams end, and the client
    /// does not reconnect.
    pub async fn close(&self) -> BridgeResult<()> {
        self.inner.closing.store(true, Ordering::SeqCst);
        if let Some(connection) = self.inner.connection.get() {
            connection.shutdown("client closed");
            connection.transport.close().await?;
            tracing::info!(service = %self.inner.config.service_name, "closed");
        }
        Ok(())
    }
}

impl fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClient")
            .field("config", &self.inner.config)
            .field("connection", &self.inner.connection.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryTransport, ReadyConnector};
    use serde_json::json;
    use std::time::Duration;

    /// A client wired to a raw worker end the test drives by hand.
    fn manual() -> (BridgeClient, MemoryTransport) {
        let (ui, worker) = MemoryTransport::pair();
        let client = BridgeClient::new(ReadyConnector::new(Arc::new(ui)));
        (client, worker)
    }

    async fn next(worker: &MemoryTransport) -> Envelope {
        worker.read_message().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn replies_route_by_id_out_of_order() {
        let (client, worker) = manual();
        let first = tokio::spawn({
            let client = client.clone();
            async move { client.call("accounts/get", Args::new()).await }
        });
        let a = next(&worker).await.id().unwrap();
        let second = tokio::spawn({
            let client = client.clone();
            async move { client.call("accounts/get", Args::new()).await }
        });
        let b = next(&worker).await.id().unwrap();
        assert_ne!(a, b);

        worker
            .write_message(Envelope::Result { id: b, value: json!("b") })
            .await
            .unwrap();
        worker
            .write_message(Envelope::error(a, "no such account"))
            .await
            .unwrap();

        assert_eq!(second.await.unwrap().unwrap(), json!("b"));
        assert!(matches!(
            first.await.unwrap(),
            Err(BridgeError::Remote(ref m)) if m == "no such account"
        ));
        assert_eq!(client.pending_calls(), 0);
    }

    #[tokio::test]
    async fn call_as_decodes() {
        let (client, worker) = manual();
        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call_as::<Vec<String>>("accounts", Args::new()).await }
        });
        let id = next(&worker).await.id().unwrap();
        worker
            .write_message(Envelope::Result { id, value: json!(["a1", "a2"]) })
            .await
            .unwrap();
        assert_eq!(call.await.unwrap().unwrap(), vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn losing_the_channel_rejects_pending_calls() {
        let (client, worker) = manual();
        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call("sync/all", Args::new()).await }
        });
        next(&worker).await;
        worker.close().await.unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert!(err.is_transport());
        assert!(client
            .call("echo", Args::new())
            .await
            .unwrap_err()
            .is_transport());
    }

    #[tokio::test]
    async fn failed_connect_is_retried() {
        let client = BridgeClient::new(crate::transport::WorkerConnector::new(|_worker| {
            Err(BridgeError::transport("worker failed to start"))
        }));
        assert!(client.call("echo", Args::new()).await.unwrap_err().is_transport());
        assert!(client.call("echo", Args::new()).await.unwrap_err().is_transport());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn stream_updates_then_cancel() {
        let (client, worker) = manual();
        let stream = client.subscribe("accounts/observe", Args::new()).await.unwrap();
        let id = next(&worker).await.id().unwrap();
        assert_eq!(id, stream.id());

        let mut updates = stream.listen_channel();
        worker
            .write_message(Envelope::Update { id, value: json!(1) })
            .await
            .unwrap();
        assert_eq!(updates.recv().await, Some(json!(1)));

        stream.cancel().await;
        stream.cancel().await;
        assert_eq!(next(&worker).await, Envelope::Cancel { id });
        assert_eq!(client.open_streams(), 0);

        worker
            .write_message(Envelope::Update { id, value: json!(2) })
            .await
            .unwrap();
        assert_eq!(updates.recv().await, None);
    }

    #[tokio::test]
    async fn service_error_ends_the_stream() {
        let (client, worker) = manual();
        let stream = client.subscribe("calendars/observe", Args::new()).await.unwrap();
        let id = next(&worker).await.id().unwrap();
        worker
            .write_message(Envelope::error(id, "store not loaded"))
            .await
            .unwrap();
        let mut updates = stream.listen_channel();
        assert_eq!(updates.recv().await, None);
        assert!(stream.is_cancelled());
    }

    #[tokio::test]
    async fn broadcasts_reach_listeners() {
        let (client, worker) = manual();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        client.on("syncStart", move |data| {
            let _ = tx.send(data.clone());
        });

        // Broadcasts are only read once the channel exists.
        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call("echo", Args::new()).await }
        });
        let id = next(&worker).await.id().unwrap();
        worker
            .write_message(Envelope::broadcast("syncStart", json!({ "n": 1 })))
            .await
            .unwrap();
        worker
            .write_message(Envelope::Result { id, value: Value::Null })
            .await
            .unwrap();
        call.await.unwrap().unwrap();

        let data = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(data, Some(json!({ "n": 1 })));
    }

    #[tokio::test]
    async fn close_rejects_and_stops_reconnecting() {
        let (client, worker) = manual();
        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call("echo", Args::new()).await }
        });
        next(&worker).await;
        client.close().await.unwrap();

        assert!(call.await.unwrap().unwrap_err().is_transport());
        assert!(worker.read_message().await.unwrap().is_none());
        assert!(client.call("echo", Args::new()).await.is_err());
    }
}
