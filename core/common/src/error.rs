//! Common error types for offsync.

use thiserror::Error;

/// Top-level error type for offsync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Key-value store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Transport-level failure talking to the remote API.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote API answered with a non-success status.
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// A remote call did not complete in time.
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the failure is worth another delivery attempt later.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout(_) | Error::Io(_) => true,
            Error::Remote { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Network("reset".to_string()).is_transient());
        assert!(Error::Timeout(500).is_transient());
        assert!(Error::Remote { status: 503, message: String::new() }.is_transient());
        assert!(Error::Remote { status: 429, message: String::new() }.is_transient());
        assert!(!Error::Remote { status: 404, message: String::new() }.is_transient());
        assert!(!Error::InvalidInput("bad".to_string()).is_transient());
    }

    #[test]
    fn test_remote_error_display() {
        let err = Error::Remote {
            status: 422,
            message: "name is required".to_string(),
        };
        assert_eq!(err.to_string(), "Remote error (422): name is required");
    }
}
