//! # Calworker Bridge
//!
//! Bidirectional RPC and streaming between a foreground (UI) context and a
//! background worker that owns the store.
//!
//! This crate provides:
//! - `Transport` abstraction with in-memory and JSON-lines implementations
//! - `BridgeClient` (`call`, `subscribe`, broadcast listening)
//! - `BridgeService` (`register_method`, `register_stream`, dispatch, `broadcast`)
//! - `Broadcaster`, a publish/subscribe registry keyed by event name
//! - `StartupGate`, a memoized one-time initialization step
//!
//! ## Guarantees
//!
//! - A reply is routed only to the call carrying the same correlation id
//! - After `ClientStream::cancel` returns, no further update reaches its listeners
//! - A failing or panicking handler produces an error reply; the service loop keeps running
//! - Losing the channel rejects every pending call with a transport error and
//!   silently closes every open stream. To a stream listener, transport loss
//!   and cancellation look the same.
//! - The bridge imposes no timeout; a hung handler hangs its caller

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod broadcast;
mod client;
mod client_stream;
mod config;
mod error;
mod gate;
mod json_lines;
mod service;
mod stream_handle;
mod transport;

pub use broadcast::{Broadcaster, EventListener, Subscription};
pub use client::BridgeClient;
pub use client_stream::{ClientStream, ListenerId, UpdateListener};
pub use config::ClientConfig;
pub use error::{BoxError, BridgeError, BridgeResult};
pub use gate::StartupGate;
pub use json_lines::JsonLinesTransport;
pub use service::{BridgeService, HandlerResult};
pub use stream_handle::StreamHandle;
pub use transport::{Connector, MemoryTransport, ReadyConnector, Transport, WorkerConnector};

pub use calworker_protocol::{Args, Endpoint, Envelope, Value};
