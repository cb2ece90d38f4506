//! Error types for tierdisk

use std::io;
use std::path::PathBuf;

/// Result type alias for tierdisk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for durable store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from the underlying filesystem
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Key or value could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record file exists but cannot be read back
    #[error("Corrupt record {path:?}: {reason}")]
    Corrupt {
        /// Record file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Encoded key does not fit the record header (max 4 GiB)
    #[error("Key too large: {0} bytes")]
    KeyTooLarge(usize),

    /// Store root exists but is not a directory
    #[error("Not a directory: {0:?}")]
    NotADirectory(PathBuf),

    /// Store root cannot be written to
    #[error("Cannot write to store directory {path:?}: {source}")]
    Unwritable {
        /// Store root
        path: PathBuf,
        /// Failure from the write probe
        source: io::Error,
    },
}
