//! Error types for the sync orchestrator.

use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors reported by sync adapters and sources.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server rejected the request.
    #[error("server error: {0}")]
    ServerError(String),

    /// Local account or calendar data could not be read.
    #[error("source error: {0}")]
    Source(String),
}

/// What a failed sync was working on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncUnit {
    /// Reading the account list at the start of a full sync.
    AccountList,
    /// One account's own data.
    Account {
        /// Account id.
        account_id: String,
    },
    /// One calendar.
    Calendar {
        /// Owning account id.
        account_id: String,
        /// Calendar id.
        calendar_id: String,
    },
}

impl fmt::Display for SyncUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncUnit::AccountList => f.write_str("account list"),
            SyncUnit::Account { account_id } => write!(f, "account {account_id}"),
            SyncUnit::Calendar {
                account_id,
                calendar_id,
            } => write!(f, "calendar {calendar_id} of account {account_id}"),
        }
    }
}

/// Failure of one sync unit.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("sync of {unit} failed: {source}")]
pub struct SyncUnitError {
    /// The unit that failed.
    pub unit: SyncUnit,
    /// The underlying error.
    #[source]
    pub source: SyncError,
}

impl SyncUnitError {
    /// Creates an error for an account unit.
    pub fn account(account_id: &str, source: SyncError) -> Self {
        Self {
            unit: SyncUnit::Account {
                account_id: account_id.to_string(),
            },
            source,
        }
    }

    /// Creates an error for a calendar unit.
    pub fn calendar(account_id: &str, calendar_id: &str, source: SyncError) -> Self {
        Self {
            unit: SyncUnit::Calendar {
                account_id: account_id.to_string(),
                calendar_id: calendar_id.to_string(),
            },
            source,
        }
    }

    /// Returns the account the failed unit belongs to, if any.
    pub fn account_id(&self) -> Option<&str> {
        match &self.unit {
            SyncUnit::AccountList => None,
            SyncUnit::Account { account_id } | SyncUnit::Calendar { account_id, .. } => {
                Some(account_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_error_names_the_account() {
        let err = SyncUnitError::account("a2", SyncError::ServerError("503".into()));
        assert_eq!(err.to_string(), "sync of account a2 failed: server error: 503");
        assert_eq!(err.account_id(), Some("a2"));

        let err = SyncUnitError::calendar("a1", "c9", SyncError::Transport("reset".into()));
        assert_eq!(
            err.to_string(),
            "sync of calendar c9 of account a1 failed: transport error: reset"
        );
        assert_eq!(err.account_id(), Some("a1"));
    }

    #[test]
    fn account_list_has_no_account() {
        let err = SyncUnitError {
            unit: SyncUnit::AccountList,
            source: SyncError::Source("store not loaded".into()),
        };
        assert_eq!(err.account_id(), None);
    }
}
