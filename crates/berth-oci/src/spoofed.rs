//! Scripted runtime for tests.
//!
//! Records every invocation and returns scripted outcomes, so lifecycle
//! behavior can be exercised without a real OCI runtime binary.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::container::Container;
use crate::error::{OciError, Result};
use crate::runtime::{Runtime, Signal};

/// Runtime double that records calls and replays scripted failures.
///
/// Each scripted error is consumed by the next matching call; with nothing
/// scripted, every operation succeeds immediately.
#[derive(Default)]
pub struct SpoofedRuntime {
    calls: Mutex<Vec<String>>,
    pause_error: Mutex<Option<OciError>>,
    unpause_error: Mutex<Option<OciError>>,
    stop_error: Mutex<Option<OciError>>,
    wait_error: Mutex<Option<OciError>>,
    signal_error: Mutex<Option<OciError>>,
    block_wait: AtomicBool,
}

impl SpoofedRuntime {
    /// Creates a spoofed runtime where everything succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded invocations, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Scripts the next `pause_container` call to fail.
    pub fn fail_next_pause(&self, err: OciError) {
        *self.pause_error.lock() = Some(err);
    }

    /// Scripts the next `unpause_container` call to fail.
    pub fn fail_next_unpause(&self, err: OciError) {
        *self.unpause_error.lock() = Some(err);
    }

    /// Scripts the next `stop_container` call to fail.
    pub fn fail_next_stop(&self, err: OciError) {
        *self.stop_error.lock() = Some(err);
    }

    /// Scripts the next `wait_container_state_stopped` call to fail.
    pub fn fail_next_wait(&self, err: OciError) {
        *self.wait_error.lock() = Some(err);
    }

    /// Scripts the next `signal_container` call to fail.
    pub fn fail_next_signal(&self, err: OciError) {
        *self.signal_error.lock() = Some(err);
    }

    /// Makes `wait_container_state_stopped` block until cancelled.
    pub fn block_wait(&self) {
        self.block_wait.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Runtime for SpoofedRuntime {
    async fn pause_container(&self, ctr: &Container) -> Result<()> {
        self.record(format!("pause {}", ctr.id));
        match self.pause_error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn unpause_container(&self, ctr: &Container) -> Result<()> {
        self.record(format!("unpause {}", ctr.id));
        match self.unpause_error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn stop_container(&self, ctr: &Container, timeout_secs: i64) -> Result<()> {
        self.record(format!("stop {} {}", ctr.id, timeout_secs));
        match self.stop_error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn wait_container_state_stopped(
        &self,
        cancel: &CancellationToken,
        ctr: &Container,
    ) -> Result<()> {
        self.record(format!("wait {}", ctr.id));
        if self.block_wait.load(Ordering::SeqCst) {
            cancel.cancelled().await;
            return Err(OciError::Cancelled(ctr.id.clone()));
        }
        match self.wait_error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn signal_container(&self, ctr: &Container, signal: Signal) -> Result<()> {
        self.record(format!("kill {} {}", ctr.id, signal));
        match self.signal_error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
