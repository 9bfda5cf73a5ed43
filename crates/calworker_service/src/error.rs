//! Error types for the calendar service.

use calworker_bridge::BridgeError;
use calworker_protocol::ProtocolError;
use calworker_store::StoreError;
use calworker_sync::SyncError;
use thiserror::Error;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors raised by the domain services and the typed client.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Bridge error (transport loss, remote failure, startup failure).
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Arguments could not be encoded or decoded.
    #[error("argument error: {0}")]
    Arguments(#[from] ProtocolError),

    /// Syncing a new account failed.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The account names a provider type the catalog does not know.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// A record failed validation.
    #[error("invalid {kind}: {reason}")]
    Invalid {
        /// Record kind (`account`, `event`, ...).
        kind: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ServiceError {
    /// Creates a validation error.
    pub fn invalid(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            kind,
            reason: reason.into(),
        }
    }

    /// Returns true if a required record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Store(e) if e.is_not_found())
    }
}
