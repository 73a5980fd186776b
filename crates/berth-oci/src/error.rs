//! Error types for runtime operations.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, OciError>;

/// Errors that can occur while driving the OCI runtime.
#[derive(Debug, Error)]
pub enum OciError {
    /// The container was already stopped when a stop was requested.
    ///
    /// Callers treat this outcome as distinct from every other failure:
    /// stopping an already-stopped container is a no-op, not an error.
    #[error("container is already stopped")]
    ContainerStopped,

    /// The container has no recorded init process.
    #[error("container {0} has no recorded init pid")]
    NoPid(String),

    /// The runtime binary exited unsuccessfully.
    #[error("runtime command failed: {0}")]
    Command(String),

    /// A wait was aborted by the caller's cancellation signal.
    #[error("wait for container {0} was cancelled")]
    Cancelled(String),

    /// Signal delivery failed.
    #[error("signal delivery failed: {0}")]
    Signal(#[from] nix::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
