//! Storage-release collaborator.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure.
    #[error("{0}")]
    Backend(String),
}

/// Backend that owns a container's on-disk filesystem resources.
///
/// The lifecycle manager calls this exactly once per stop, after the runtime
/// has confirmed the container's process reached the stopped state.
#[async_trait]
pub trait ContainerStorage: Send + Sync {
    /// Unmounts and releases the container's filesystem resources.
    async fn release_container_filesystem(&self, id: &str) -> Result<(), StorageError>;
}

/// Storage backend keeping each container's scratch space in a directory
/// tree under one root.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Creates a backend rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContainerStorage for LocalStorage {
    async fn release_container_filesystem(&self, id: &str) -> Result<(), StorageError> {
        let dir = self.root.join(id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            // Already released; repeated stops must stay idempotent.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
