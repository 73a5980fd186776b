//! CLI-backed OCI runtime.
//!
//! Drives a `runc`-compatible binary (`runc`, `crun`, `youki`) through its
//! command-line interface. Stop confirmation prefers the monitor's exit
//! files when an exit notifier is configured, and falls back to probing the
//! recorded init pid with signal 0.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use berth_watch::DirectoryNotifier;
use nix::errno::Errno;
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::container::Container;
use crate::error::{OciError, Result};
use crate::runtime::{Runtime, Signal};

/// Default interval between liveness probes while waiting for an exit.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Budget for the process to disappear after SIGKILL escalation.
const KILL_GRACE: Duration = Duration::from_secs(10);

/// OCI runtime backed by a `runc`-style command-line binary.
pub struct CommandRuntime {
    runtime_path: PathBuf,
    root: Option<PathBuf>,
    poll_interval: Duration,
    exit_notifier: Option<Arc<DirectoryNotifier>>,
}

impl CommandRuntime {
    /// Creates a runtime driving the given binary.
    #[must_use]
    pub fn new(runtime_path: impl Into<PathBuf>) -> Self {
        Self {
            runtime_path: runtime_path.into(),
            root: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            exit_notifier: None,
        }
    }

    /// Sets the runtime's state root directory (`--root`).
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Overrides the liveness-probe interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Confirms stops through the process monitor's exit files.
    ///
    /// The notifier watches the directory where the monitor writes one file
    /// per container id on exit; waiting for the stopped state then blocks
    /// on the file's creation signal instead of probing the pid.
    #[must_use]
    pub fn with_exit_files(mut self, notifier: Arc<DirectoryNotifier>) -> Self {
        self.exit_notifier = Some(notifier);
        self
    }

    /// Builds the full argument vector for one runtime invocation.
    fn command_line(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        if let Some(root) = &self.root {
            argv.push("--root".to_string());
            argv.push(root.display().to_string());
        }
        argv.extend(args.iter().map(ToString::to_string));
        argv
    }

    /// Runs the runtime binary with the given subcommand arguments.
    async fn run(&self, args: &[&str]) -> Result<()> {
        let argv = self.command_line(args);
        tracing::debug!("running {} {}", self.runtime_path.display(), argv.join(" "));

        let output = Command::new(&self.runtime_path).args(&argv).output().await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(OciError::Command(format!(
            "`{}` exited with {}: {}",
            args.join(" "),
            output.status,
            stderr.trim()
        )))
    }

    /// Polls the init pid until it disappears or the budget runs out.
    ///
    /// Returns true if the process exited within the budget.
    async fn wait_for_exit(&self, pid: i32, budget: Duration) -> bool {
        let deadline = Instant::now() + budget;
        while Instant::now() < deadline {
            if !process_alive(pid) {
                return true;
            }
            sleep(self.poll_interval).await;
        }
        !process_alive(pid)
    }

    /// Probes the init pid until the process is gone or `cancel` fires.
    async fn poll_until_stopped(&self, cancel: &CancellationToken, ctr: &Container) -> Result<()> {
        let Some(pid) = ctr.pid else {
            // Never started; there is no process to wait for.
            return Ok(());
        };

        loop {
            if !process_alive(pid) {
                return Ok(());
            }
            tokio::select! {
                () = cancel.cancelled() => return Err(OciError::Cancelled(ctr.id.clone())),
                () = sleep(self.poll_interval) => {}
            }
        }
    }

    /// Blocks on the monitor's exit file for `ctr` instead of probing.
    async fn wait_for_exit_file(
        &self,
        cancel: &CancellationToken,
        ctr: &Container,
        notifier: &DirectoryNotifier,
    ) -> Result<()> {
        let path = notifier.directory().join(&ctr.id);
        if path.exists() {
            return Ok(());
        }

        let rx = match notifier.notifier_for_file(&path) {
            Ok(rx) => rx,
            // Another waiter already holds the one-shot for this exit file;
            // fall back to probing rather than stealing its signal.
            Err(_) => return self.poll_until_stopped(cancel, ctr).await,
        };

        // The file may have appeared between the existence check and the
        // registration.
        if path.exists() {
            return Ok(());
        }

        tokio::select! {
            () = cancel.cancelled() => Err(OciError::Cancelled(ctr.id.clone())),
            res = rx => match res {
                Ok(()) => Ok(()),
                // The notifier's event stream is gone; probing still works.
                Err(_) => self.poll_until_stopped(cancel, ctr).await,
            },
        }
    }
}

#[async_trait]
impl Runtime for CommandRuntime {
    async fn pause_container(&self, ctr: &Container) -> Result<()> {
        self.run(&["pause", &ctr.id]).await
    }

    async fn unpause_container(&self, ctr: &Container) -> Result<()> {
        self.run(&["resume", &ctr.id]).await
    }

    async fn stop_container(&self, ctr: &Container, timeout_secs: i64) -> Result<()> {
        let Some(pid) = ctr.pid else {
            return Err(OciError::ContainerStopped);
        };
        if !process_alive(pid) {
            return Err(OciError::ContainerStopped);
        }

        if timeout_secs > 0 {
            match self.run(&["kill", &ctr.id, "TERM"]).await {
                Ok(()) => {}
                Err(err) if is_not_running(&err) => return Err(OciError::ContainerStopped),
                Err(err) => return Err(err),
            }

            let budget = Duration::from_secs(u64::try_from(timeout_secs).unwrap_or(0));
            if self.wait_for_exit(pid, budget).await {
                return Ok(());
            }
            tracing::warn!(
                "container {} did not stop within {}s, escalating to SIGKILL",
                ctr.id,
                timeout_secs
            );
        }

        match self.run(&["kill", &ctr.id, "KILL"]).await {
            // The process may have exited between the TERM grace period and
            // the escalation; that still counts as a completed stop.
            Ok(()) => {}
            Err(err) if is_not_running(&err) => {}
            Err(err) => return Err(err),
        }

        if self.wait_for_exit(pid, KILL_GRACE).await {
            Ok(())
        } else {
            Err(OciError::Command(format!(
                "container {} is still alive after SIGKILL",
                ctr.id
            )))
        }
    }

    async fn wait_container_state_stopped(
        &self,
        cancel: &CancellationToken,
        ctr: &Container,
    ) -> Result<()> {
        match &self.exit_notifier {
            Some(notifier) => self.wait_for_exit_file(cancel, ctr, notifier).await,
            None => self.poll_until_stopped(cancel, ctr).await,
        }
    }

    async fn signal_container(&self, ctr: &Container, signal: Signal) -> Result<()> {
        let pid = ctr.pid.ok_or_else(|| OciError::NoPid(ctr.id.clone()))?;
        tracing::debug!("sending {} to container {} (pid {})", signal, ctr.id, pid);
        nix::sys::signal::kill(Pid::from_raw(pid), signal)?;
        Ok(())
    }
}

/// Probes whether a process exists.
///
/// EPERM means the process exists but belongs to another user, which still
/// counts as alive.
fn process_alive(pid: i32) -> bool {
    match nix::sys::signal::kill(Pid::from_raw(pid), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Matches the runtime CLI's "nothing to kill" failures.
fn is_not_running(err: &OciError) -> bool {
    match err {
        OciError::Command(msg) => {
            msg.contains("container not running")
                || msg.contains("does not exist")
                || msg.contains("process already finished")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_plain() {
        let rt = CommandRuntime::new("/usr/bin/runc");
        assert_eq!(rt.command_line(&["pause", "ctr-1"]), vec!["pause", "ctr-1"]);
    }

    #[test]
    fn test_command_line_with_root() {
        let rt = CommandRuntime::new("/usr/bin/runc").with_root("/run/berth/runc");
        assert_eq!(
            rt.command_line(&["kill", "ctr-1", "TERM"]),
            vec!["--root", "/run/berth/runc", "kill", "ctr-1", "TERM"]
        );
    }

    #[test]
    fn test_process_alive_self() {
        let pid = i32::try_from(std::process::id()).unwrap();
        assert!(process_alive(pid));
    }

    #[test]
    fn test_is_not_running_matches_runc_phrasing() {
        let err = OciError::Command("`kill ctr-1 TERM` exited with 1: container not running".into());
        assert!(is_not_running(&err));

        let err = OciError::Command("`kill ctr-1 TERM` exited with 1: permission denied".into());
        assert!(!is_not_running(&err));

        assert!(!is_not_running(&OciError::ContainerStopped));
    }

    #[tokio::test]
    async fn test_wait_cancelled() {
        let rt = CommandRuntime::new("/usr/bin/runc");
        let mut ctr = Container::with_id("ctr-1", "web", "/run/bundles/web");
        // Our own pid stays alive for the duration of the test.
        ctr.set_pid(i32::try_from(std::process::id()).unwrap());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = rt
            .wait_container_state_stopped(&cancel, &ctr)
            .await
            .unwrap_err();
        assert!(matches!(err, OciError::Cancelled(id) if id == "ctr-1"));
    }

    #[tokio::test]
    async fn test_wait_without_pid_returns_immediately() {
        let rt = CommandRuntime::new("/usr/bin/runc");
        let ctr = Container::with_id("ctr-1", "web", "/run/bundles/web");
        let cancel = CancellationToken::new();
        rt.wait_container_state_stopped(&cancel, &ctr).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wait_fires_on_exit_file_creation() {
        let exits = tempfile::tempdir().unwrap();
        let notifier =
            Arc::new(DirectoryNotifier::new(exits.path(), &[berth_watch::WatchOp::Create]).unwrap());
        let rt = CommandRuntime::new("/usr/bin/runc").with_exit_files(Arc::clone(&notifier));

        let mut ctr = Container::with_id("ctr-1", "web", "/run/bundles/web");
        ctr.set_pid(i32::try_from(std::process::id()).unwrap());

        let cancel = CancellationToken::new();
        let exit_file = exits.path().join("ctr-1");
        let write_exit = async {
            sleep(Duration::from_millis(100)).await;
            std::fs::write(&exit_file, b"0").unwrap();
        };

        let (res, ()) = tokio::join!(rt.wait_container_state_stopped(&cancel, &ctr), write_exit);
        res.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wait_returns_immediately_for_existing_exit_file() {
        let exits = tempfile::tempdir().unwrap();
        std::fs::write(exits.path().join("ctr-1"), b"0").unwrap();

        let notifier =
            Arc::new(DirectoryNotifier::new(exits.path(), &[berth_watch::WatchOp::Create]).unwrap());
        let rt = CommandRuntime::new("/usr/bin/runc").with_exit_files(notifier);

        let mut ctr = Container::with_id("ctr-1", "web", "/run/bundles/web");
        ctr.set_pid(i32::try_from(std::process::id()).unwrap());

        let cancel = CancellationToken::new();
        rt.wait_container_state_stopped(&cancel, &ctr).await.unwrap();
    }
}
