//! Error types for protocol encoding and argument decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding or reading arguments.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A required positional argument was not supplied.
    #[error("missing argument at position {0}")]
    MissingArgument(usize),

    /// A positional argument has the wrong shape.
    #[error("invalid argument at position {index}: {reason}")]
    InvalidArgument {
        /// Position of the argument.
        index: usize,
        /// Why it could not be decoded.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::MissingArgument(2);
        assert_eq!(err.to_string(), "missing argument at position 2");

        let err = ProtocolError::InvalidArgument {
            index: 0,
            reason: "expected string".into(),
        };
        assert!(err.to_string().contains("position 0"));
        assert!(err.to_string().contains("expected string"));
    }
}
