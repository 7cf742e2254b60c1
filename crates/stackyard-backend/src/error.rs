//! Error types for storage media

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors raised by a storage medium
///
/// Messages name the operation and the object key or path. Credentials
/// never appear in them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// Local filesystem error
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Object service answered with an unexpected status
    #[error("{op} '{key}' failed with HTTP {status}: {message}")]
    Http {
        op: &'static str,
        key: String,
        status: u16,
        message: String,
    },

    /// Request never got a response
    #[error("{op} '{key}' failed: {message}")]
    Network {
        op: &'static str,
        key: String,
        message: String,
    },

    /// Deadline elapsed before the medium answered
    #[error("{op} '{key}' timed out after {after:?}")]
    Timeout {
        op: &'static str,
        key: String,
        after: Duration,
    },

    /// Object key cannot be mapped onto the medium
    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Backend configuration is incomplete or malformed
    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),
}

impl BackendError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn network(op: &'static str, key: &str, err: reqwest::Error) -> Self {
        // reqwest includes the URL in its message; strip it so that query
        // strings never reach logs
        Self::Network {
            op,
            key: key.to_string(),
            message: err.without_url().to_string(),
        }
    }

    /// Whether the error came from an elapsed deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
