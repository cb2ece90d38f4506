//! Error types for tiercache

use std::io;

use crate::cache::PutOutcome;

/// Result type alias for tiercache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache operations
///
/// A rejected `put` and a `get` miss are not errors; they are reported
/// through [`PutOutcome::Rejected`] and `None`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Capacity of zero
    #[error("Capacity must be greater than 0")]
    InvalidCapacity,

    /// I/O error while saving or loading a snapshot file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot could not be encoded or parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot parsed but breaks a cache invariant
    #[error("Invalid snapshot: {0}")]
    Validation(String),

    /// Durable tier failed on a read, remove, clear or size query
    #[error("Durable tier error: {0}")]
    Durable(#[from] tierdisk::Error),

    /// Fast tier was updated but the durable write failed
    #[error("Durable write failed (fast tier {fast:?}): {source}")]
    PartialWrite {
        /// What the fast tier did with the entry
        fast: PutOutcome,
        /// Durable tier failure
        source: tierdisk::Error,
    },
}
