//! Lifecycle operations: pause, unpause, stop, kill.
//!
//! Each operation resolves the container, holds its handle lock for the
//! whole transition, drives the runtime, writes the new state back, and
//! persists a snapshot. State is mutated only after the runtime call
//! succeeded (or reported the accepted already-stopped outcome).

use berth_oci::{ContainerState, OciError, Signal};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ServerError};
use crate::server::ContainerServer;

impl ContainerServer {
    /// Pauses a container.
    ///
    /// Returns the container id on success.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotFound`] for an unknown id,
    /// [`ServerError::AlreadyPaused`] if the container is already paused
    /// (no side effects), or [`ServerError::Runtime`] if the runtime call
    /// fails (no state mutation).
    pub async fn pause_container(&self, id: &str) -> Result<String> {
        let handle = self.get_container(id)?;
        let mut ctr = handle.lock().await;
        tracing::debug!("pausing container {ctr}");

        if ctr.is_paused() {
            return Err(ServerError::AlreadyPaused(ctr.id.clone()));
        }

        self.runtime
            .pause_container(&ctr)
            .await
            .map_err(|source| ServerError::Runtime {
                id: ctr.id.clone(),
                op: "pause",
                source,
            })?;

        ctr.set_state(ContainerState::Paused);
        self.container_state_to_disk(&ctr);
        Ok(ctr.id.clone())
    }

    /// Resumes a paused container.
    ///
    /// Returns the container id on success.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotFound`] for an unknown id,
    /// [`ServerError::NotPaused`] if the container is not paused (no side
    /// effects), or [`ServerError::Runtime`] if the runtime call fails.
    pub async fn unpause_container(&self, id: &str) -> Result<String> {
        let handle = self.get_container(id)?;
        let mut ctr = handle.lock().await;
        tracing::debug!("unpausing container {ctr}");

        if !ctr.is_paused() {
            return Err(ServerError::NotPaused(ctr.id.clone()));
        }

        self.runtime
            .unpause_container(&ctr)
            .await
            .map_err(|source| ServerError::Runtime {
                id: ctr.id.clone(),
                op: "unpause",
                source,
            })?;

        ctr.set_state(ContainerState::Running);
        self.container_state_to_disk(&ctr);
        Ok(ctr.id.clone())
    }

    /// Stops a container, allowing `timeout_secs` for graceful shutdown.
    ///
    /// Stopping an already-stopped container is a no-op success, so callers
    /// racing to stop the same container need no status query first. After
    /// a confirmed stop the container's filesystem resources are released;
    /// the wait for confirmation honors `cancel`.
    ///
    /// Returns the container id on success.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotFound`] for an unknown id,
    /// [`ServerError::Cancelled`] if `cancel` fired during the wait phase
    /// (the storage release is not attempted), or
    /// [`ServerError::Runtime`]/[`ServerError::Storage`] for other
    /// failures; a state snapshot is persisted before those are returned.
    pub async fn stop_container(
        &self,
        cancel: &CancellationToken,
        id: &str,
        timeout_secs: i64,
    ) -> Result<String> {
        let handle = self.get_container(id)?;
        let mut ctr = handle.lock().await;
        let cid = ctr.id.clone();
        tracing::debug!("stopping container {ctr} (timeout {timeout_secs}s)");

        match self.runtime.stop_container(&ctr, timeout_secs).await {
            Ok(()) => {
                match self.runtime.wait_container_state_stopped(cancel, &ctr).await {
                    Ok(()) => {}
                    Err(OciError::Cancelled(_)) => {
                        return Err(ServerError::Cancelled(cid));
                    }
                    Err(source) => {
                        self.container_state_to_disk(&ctr);
                        return Err(ServerError::Runtime {
                            id: cid,
                            op: "wait for stop",
                            source,
                        });
                    }
                }

                if let Err(source) = self.storage.release_container_filesystem(&cid).await {
                    self.container_state_to_disk(&ctr);
                    return Err(ServerError::Storage { id: cid, source });
                }
            }
            // Racing stops are expected; the loser's failure reflects a
            // container that is already where the caller wants it.
            Err(OciError::ContainerStopped) => {
                tracing::debug!("container {cid} is already stopped");
            }
            Err(source) => {
                self.container_state_to_disk(&ctr);
                return Err(ServerError::Runtime {
                    id: cid,
                    op: "stop",
                    source,
                });
            }
        }

        ctr.set_state(ContainerState::Stopped);
        self.container_state_to_disk(&ctr);
        tracing::info!("stopped container {cid}");
        Ok(cid)
    }

    /// Delivers `signal` directly to a container's init process, bypassing
    /// the graceful-stop protocol.
    ///
    /// Returns the container id on success. The container's state is left
    /// untouched; any resulting exit is observed through the process-exit
    /// path, not here.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotFound`] for an unknown id or
    /// [`ServerError::Runtime`] if delivery fails.
    pub async fn kill_container(&self, id: &str, signal: Signal) -> Result<String> {
        let handle = self.get_container(id)?;
        let ctr = handle.lock().await;
        tracing::debug!("sending {signal} to container {ctr}");

        self.runtime
            .signal_container(&ctr, signal)
            .await
            .map_err(|source| ServerError::Runtime {
                id: ctr.id.clone(),
                op: "kill",
                source,
            })?;

        Ok(ctr.id.clone())
    }
}
