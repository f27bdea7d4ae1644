//! Common error types used throughout framesense.
//!
//! Covers failures while reading collections manifests and per-folder record
//! files. Nothing here is retried; callers surface these as fatal.

use std::path::PathBuf;

/// Common error type for framesense.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file or directory that had to exist was not found.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The collections manifest is malformed.
    #[error("Invalid collections manifest {}: {message}", path.display())]
    InvalidManifest { path: PathBuf, message: String },

    /// A record file could not be parsed as JSON.
    #[error("Malformed record file {}: {source}", path.display())]
    MalformedRecord {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A record file parsed but does not have the canonical shape.
    #[error("Unsupported record file format in {}: {reason}", path.display())]
    UnsupportedRecordFormat { path: PathBuf, reason: String },

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed outside of a record file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a new InvalidManifest error.
    pub fn invalid_manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new UnsupportedRecordFormat error.
    pub fn unsupported_record(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedRecordFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
