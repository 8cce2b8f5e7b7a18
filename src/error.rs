//! Error types for music-dl
//!
//! Two layers live here:
//! - [`Error`], returned from manager operations and collaborator traits
//! - [`ErrorInfo`], the serializable failure record carried by a task in `Error` status

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for music-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for music-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "save_dir")
        key: Option<String>,
    },

    /// Filesystem operation on a specific path failed
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        /// Path the operation targeted
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Transfer failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Task state error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// URL resolver or lyric provider failed
    #[error("provider error: {0}")]
    Provider(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Manager is shutting down
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,
}

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Task state errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Task not found in the registry
    #[error("task {id} not found")]
    NotFound {
        /// The task ID that was not found
        id: String,
    },

    /// Operation not allowed in the task's current state
    #[error("cannot {operation} task {id} in state {current_state}")]
    InvalidState {
        /// The task ID
        id: String,
        /// The operation that was attempted
        operation: String,
        /// The state the task was in
        current_state: String,
    },
}

/// Errors produced by a transfer
#[derive(Debug, Error)]
pub enum TransportError {
    /// Transfer was cancelled cooperatively
    #[error("transfer cancelled")]
    Cancelled,

    /// Server answered with a non-success status
    #[error("HTTP status {status}")]
    Http {
        /// Status code returned by the server
        status: u16,
    },

    /// Connection or protocol failure
    #[error("network error: {0}")]
    Network(String),

    /// Writing the destination file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => TransportError::Http {
                status: status.as_u16(),
            },
            None => TransportError::Network(e.to_string()),
        }
    }
}

/// Cause classification of a failed task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No playable URL was obtained
    ResolutionFailed,
    /// Network or I/O failure during the transfer
    TransportError,
    /// Cooperative abort (never shown as a failure)
    Cancelled,
    /// Directory or file operation failed outside the transfer
    FilesystemError,
}

/// Failure record attached to a task in `Error` status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Cause classification
    pub kind: ErrorKind,
    /// Underlying message
    pub message: String,
}

impl ErrorInfo {
    /// Build a record
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl From<&TransportError> for ErrorInfo {
    fn from(e: &TransportError) -> Self {
        let kind = match e {
            TransportError::Cancelled => ErrorKind::Cancelled,
            TransportError::Http { .. } | TransportError::Network(_) | TransportError::Io(_) => {
                ErrorKind::TransportError
            }
        };
        ErrorInfo::new(kind, e.to_string())
    }
}
