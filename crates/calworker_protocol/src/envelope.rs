//! Message envelope exchanged between the two sides of the bridge.

use crate::args::Args;
use crate::endpoints::Endpoint;
use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one call or subscription within the lifetime of a connection.
///
/// Replies and updates carry the id of the request they belong to, which is
/// how the client routes them back to the waiting future or stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Creates an id from its raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocates correlation ids for one connection.
///
/// Ids start at 1 and only ever grow, so an id is never handed out twice
/// while the allocator lives.
#[derive(Debug)]
pub struct CorrelationIdAllocator {
    next: AtomicU64,
}

impl CorrelationIdAllocator {
    /// Creates a new allocator.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocates the next id.
    pub fn next_id(&self) -> CorrelationId {
        CorrelationId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CorrelationIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A bridge message.
///
/// The JSON form is tagged by `kind`:
///
/// ```text
/// { "kind": "call",      "id": 1, "endpoint": "accounts/get", "args": ["a1"] }
/// { "kind": "subscribe", "id": 2, "endpoint": "accounts/observe", "args": [] }
/// { "kind": "cancel",    "id": 2 }
/// { "kind": "result",    "id": 1, "value": {...} }
/// { "kind": "update",    "id": 2, "value": [...] }
/// { "kind": "error",     "id": 1, "message": "..." }
/// { "kind": "broadcast", "event": "syncStart", "data": null }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Envelope {
    /// Invoke a method once.
    Call {
        /// Correlation id chosen by the client.
        id: CorrelationId,
        /// Target endpoint.
        endpoint: Endpoint,
        /// Positional arguments.
        #[serde(default)]
        args: Args,
    },
    /// Open a stream.
    Subscribe {
        /// Correlation id chosen by the client.
        id: CorrelationId,
        /// Target endpoint.
        endpoint: Endpoint,
        /// Positional arguments.
        #[serde(default)]
        args: Args,
    },
    /// Close a stream opened with `Subscribe`.
    Cancel {
        /// Id of the stream.
        id: CorrelationId,
    },
    /// Successful reply to a `Call`.
    Result {
        /// Id of the call.
        id: CorrelationId,
        /// Returned value.
        #[serde(default)]
        value: Value,
    },
    /// One value pushed on an open stream.
    Update {
        /// Id of the stream.
        id: CorrelationId,
        /// Pushed value.
        #[serde(default)]
        value: Value,
    },
    /// Failed call, or a stream whose handler failed.
    Error {
        /// Id of the call or stream.
        id: CorrelationId,
        /// Error message produced by the handler.
        message: String,
    },
    /// One-way notification, no reply expected.
    Broadcast {
        /// Event name.
        event: String,
        /// Event payload.
        #[serde(default)]
        data: Value,
    },
}

impl Envelope {
    /// Creates a call envelope.
    pub fn call(id: CorrelationId, endpoint: impl Into<Endpoint>, args: Args) -> Self {
        Envelope::Call {
            id,
            endpoint: endpoint.into(),
            args,
        }
    }

    /// Creates a subscribe envelope.
    pub fn subscribe(id: CorrelationId, endpoint: impl Into<Endpoint>, args: Args) -> Self {
        Envelope::Subscribe {
            id,
            endpoint: endpoint.into(),
            args,
        }
    }

    /// Creates an error envelope.
    pub fn error(id: CorrelationId, message: impl Into<String>) -> Self {
        Envelope::Error {
            id,
            message: message.into(),
        }
    }

    /// Creates a broadcast envelope.
    pub fn broadcast(event: impl Into<String>, data: Value) -> Self {
        Envelope::Broadcast {
            event: event.into(),
            data,
        }
    }

    /// Returns the correlation id, if the envelope carries one.
    pub fn id(&self) -> Option<CorrelationId> {
        match self {
            Envelope::Call { id, .. }
            | Envelope::Subscribe { id, .. }
            | Envelope::Cancel { id }
            | Envelope::Result { id, .. }
            | Envelope::Update { id, .. }
            | Envelope::Error { id, .. } => Some(*id),
            Envelope::Broadcast { .. } => None,
        }
    }

    /// Returns the wire name of the envelope kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Call { .. } => "call",
            Envelope::Subscribe { .. } => "subscribe",
            Envelope::Cancel { .. } => "cancel",
            Envelope::Result { .. } => "result",
            Envelope::Update { .. } => "update",
            Envelope::Error { .. } => "error",
            Envelope::Broadcast { .. } => "broadcast",
        }
    }

    /// Returns true for envelopes only a client may send.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Envelope::Call { .. } | Envelope::Subscribe { .. } | Envelope::Cancel { .. }
        )
    }

    /// Encodes to a single line of JSON.
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes from JSON.
    pub fn from_json(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn allocator_never_repeats() {
        let ids = CorrelationIdAllocator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        let c = ids.next_id();
        assert_eq!(a.get(), 1);
        assert!(a < b && b < c);
    }

    #[test]
    fn call_wire_shape() {
        let envelope = Envelope::call(
            CorrelationId::new(7),
            "accounts/get",
            Args::from(vec![json!("a1")]),
        );
        let value: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "kind": "call", "id": 7, "endpoint": "accounts/get", "args": ["a1"] })
        );
    }

    #[test]
    fn broadcast_without_data() {
        let envelope = Envelope::from_json(r#"{"kind":"broadcast","event":"syncStart"}"#).unwrap();
        assert_eq!(envelope, Envelope::broadcast("syncStart", Value::Null));
        assert_eq!(envelope.id(), None);
        assert_eq!(envelope.kind(), "broadcast");
    }

    #[test]
    fn error_and_cancel_decode() {
        let envelope = Envelope::from_json(r#"{"kind":"error","id":3,"message":"boom"}"#).unwrap();
        assert_eq!(envelope, Envelope::error(CorrelationId::new(3), "boom"));
        assert!(!envelope.is_request());

        let envelope = Envelope::from_json(r#"{"kind":"cancel","id":4}"#).unwrap();
        assert_eq!(envelope.id(), Some(CorrelationId::new(4)));
        assert!(envelope.is_request());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(Envelope::from_json(r#"{"kind":"ping","id":1}"#).is_err());
    }
}
