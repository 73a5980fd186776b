//! The OCI runtime capability trait.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::container::Container;
use crate::error::Result;

pub use nix::sys::signal::Signal;

/// Capability set an OCI-compatible runtime exposes to the lifecycle manager.
///
/// Implementations perform the actual process-control syscalls. The lifecycle
/// manager owns all container state bookkeeping; a runtime only acts on the
/// external process and reports outcomes.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Pauses a running container.
    async fn pause_container(&self, ctr: &Container) -> Result<()>;

    /// Resumes a paused container.
    async fn unpause_container(&self, ctr: &Container) -> Result<()>;

    /// Stops a container, allowing `timeout_secs` for graceful shutdown
    /// before escalating.
    ///
    /// Must return [`crate::OciError::ContainerStopped`] when the container
    /// was already stopped, so callers can treat the retry as a no-op.
    async fn stop_container(&self, ctr: &Container, timeout_secs: i64) -> Result<()>;

    /// Blocks until the runtime confirms the container's process has reached
    /// the stopped state, or `cancel` fires.
    async fn wait_container_state_stopped(
        &self,
        cancel: &CancellationToken,
        ctr: &Container,
    ) -> Result<()>;

    /// Delivers `signal` directly to the container's init process, bypassing
    /// the graceful-stop protocol.
    async fn signal_container(&self, ctr: &Container, signal: Signal) -> Result<()>;
}
