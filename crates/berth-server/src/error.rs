//! Error types for lifecycle operations.

use berth_oci::OciError;
use thiserror::Error;

use crate::storage::StorageError;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors surfaced by the container server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The referenced container does not exist.
    #[error("container not found: {0}")]
    NotFound(String),

    /// Pause was requested for a container that is already paused.
    #[error("container {0} is already paused")]
    AlreadyPaused(String),

    /// Unpause was requested for a container that is not paused.
    #[error("container {0} is not paused")]
    NotPaused(String),

    /// The underlying runtime call failed.
    #[error("runtime {op} failed for container {id}: {source}")]
    Runtime {
        /// Container the operation targeted.
        id: String,
        /// Operation name, for diagnostics.
        op: &'static str,
        /// Underlying runtime failure.
        #[source]
        source: OciError,
    },

    /// Releasing the container's filesystem resources failed.
    #[error("storage release failed for container {id}: {source}")]
    Storage {
        /// Container the operation targeted.
        id: String,
        /// Underlying storage failure.
        #[source]
        source: StorageError,
    },

    /// The wait-for-stopped phase was aborted by the caller.
    #[error("stop of container {0} was cancelled")]
    Cancelled(String),

    /// The container name is reserved for another container.
    #[error("name {name} is reserved for container {id}")]
    NameReserved {
        /// The contested name.
        name: String,
        /// Container currently holding the reservation.
        id: String,
    },

    /// I/O error while reading persisted state.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state could not be decoded.
    #[error("decoding container state: {0}")]
    State(#[from] serde_json::Error),
}
