//! Error types for the progress engine.

use std::path::PathBuf;

use thiserror::Error;

/// Comprehensive error type for all progress engine operations.
///
/// Unknown plan or task ids are deliberately *not* represented here: every
/// lookup-based operation returns an `Option` that callers must check.
/// Errors are reserved for configuration mistakes and I/O failures.
#[derive(Error, Debug)]
pub enum ProgressError {
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// A persisted snapshot that cannot be trusted (unparseable or missing
    /// required fields)
    #[error("Invalid snapshot at '{path}': {reason}")]
    InvalidSnapshot { path: PathBuf, reason: String },
    /// Configuration errors (programming mistakes, fatal at construction)
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ProgressError {
    /// Creates a file system error with path context.
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Creates a configuration error from a message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an invalid snapshot error with the offending path.
    pub fn invalid_snapshot(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for progress engine operations
pub type Result<T> = std::result::Result<T, ProgressError>;
