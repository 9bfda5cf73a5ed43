//! Error types for the bridge.

use calworker_protocol::ProtocolError;
use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Boxed error returned by handlers and initialization steps.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur on either side of the bridge.
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// The channel could not be established or closed mid-flight.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote handler failed; carries the message from the error reply.
    #[error("remote error: {0}")]
    Remote(String),

    /// An endpoint was registered twice for the same role.
    #[error("{role} endpoint registered twice: {endpoint}")]
    DuplicateEndpoint {
        /// `method` or `stream`.
        role: &'static str,
        /// The endpoint name.
        endpoint: String,
    },

    /// The one-time startup step failed.
    #[error("startup failed: {0}")]
    Startup(String),

    /// Arguments or payloads could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

impl BridgeError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Returns true if the error comes from losing the channel.
    pub fn is_transport(&self) -> bool {
        matches!(self, BridgeError::Transport(_))
    }
}

impl From<ProtocolError> for BridgeError {
    fn from(err: ProtocolError) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert!(BridgeError::transport("closed").is_transport());
        assert!(!BridgeError::Remote("boom".into()).is_transport());
    }

    #[test]
    fn error_display() {
        let err = BridgeError::DuplicateEndpoint {
            role: "method",
            endpoint: "accounts/get".into(),
        };
        assert_eq!(
            err.to_string(),
            "method endpoint registered twice: accounts/get"
        );
        assert_eq!(
            BridgeError::Remote("no such account".into()).to_string(),
            "remote error: no such account"
        );
    }
}
