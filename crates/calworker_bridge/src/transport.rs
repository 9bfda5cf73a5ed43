//! Transport layer between the two execution contexts.

use crate::error::{BridgeError, BridgeResult};
use async_trait::async_trait;
use calworker_protocol::Envelope;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// A bidirectional message channel.
///
/// Messages written on one end are read, in order, on the other end. Nothing
/// is promised about ordering across different channels.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Reads the next message. Returns `None` once the channel is closed.
    async fn read_message(&self) -> BridgeResult<Option<Envelope>>;

    /// Writes a message to the peer.
    async fn write_message(&self, envelope: Envelope) -> BridgeResult<()>;

    /// Closes this end. Pending and future reads on this end return `None`;
    /// the peer observes end of stream.
    async fn close(&self) -> BridgeResult<()>;
}

/// In-process transport; one half of a connected pair.
#[derive(Debug)]
pub struct MemoryTransport {
    tx: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>,
    closed: watch::Sender<bool>,
}

impl MemoryTransport {
    /// Creates two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(tx: mpsc::UnboundedSender<Envelope>, rx: mpsc::UnboundedReceiver<Envelope>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            closed,
        }
    }

    /// Returns true once `close` was called on this end.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_message(&self) -> BridgeResult<Option<Envelope>> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }
        let mut rx = self.rx.lock().await;
        tokio::select! {
            message = rx.recv() => Ok(message),
            _ = closed.changed() => Ok(None),
        }
    }

    async fn write_message(&self, envelope: Envelope) -> BridgeResult<()> {
        let tx = self.tx.lock().clone();
        match tx {
            Some(tx) => tx
                .send(envelope)
                .map_err(|_| BridgeError::transport("peer closed the channel")),
            None => Err(BridgeError::transport("channel closed")),
        }
    }

    async fn close(&self) -> BridgeResult<()> {
        self.tx.lock().take();
        self.closed.send_replace(true);
        Ok(())
    }
}

/// Establishes the client's channel on first use.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a channel to the service.
    async fn connect(&self) -> BridgeResult<Arc<dyn Transport>>;
}

/// Connector that starts an in-process worker.
///
/// Each `connect` creates a [`MemoryTransport`] pair, keeps the UI end and
/// passes the worker end to `spawn`, which is expected to start serving it.
pub struct WorkerConnector<F> {
    spawn: F,
}

impl<F> WorkerConnector<F>
where
    F: Fn(MemoryTransport) -> BridgeResult<()> + Send + Sync,
{
    /// Creates a connector around the worker spawn function.
    pub fn new(spawn: F) -> Self {
        Self { spawn }
    }
}

#[async_trait]
impl<F> Connector for WorkerConnector<F>
where
    F: Fn(MemoryTransport) -> BridgeResult<()> + Send + Sync,
{
    async fn connect(&self) -> BridgeResult<Arc<dyn Transport>> {
        let (ui, worker) = MemoryTransport::pair();
        (self.spawn)(worker)?;
        Ok(Arc::new(ui))
    }
}

/// Connector around a channel that is already open.
///
/// Hands out its transport once; later attempts fail.
#[derive(Debug)]
pub struct ReadyConnector {
    transport: Mutex<Option<Arc<dyn Transport>>>,
}

impl ReadyConnector {
    /// Wraps an open transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport: Mutex::new(Some(transport)),
        }
    }
}

#[async_trait]
impl Connector for ReadyConnector {
    async fn connect(&self) -> BridgeResult<Arc<dyn Transport>> {
        self.transport
            .lock()
            .take()
            .ok_or_else(|| BridgeError::transport("transport already handed out"))
    }
}
