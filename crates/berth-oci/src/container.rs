//! The in-memory container record.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::ContainerState;

/// In-memory record for one container.
///
/// The record doubles as the persisted state snapshot: the lifecycle manager
/// serializes it to disk after every accepted state transition. The `state`
/// field is mutated only by the lifecycle manager, which serializes all
/// operations on a single container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    /// Container ID (unique, opaque).
    pub id: String,
    /// Human-readable container name.
    pub name: String,
    /// Absolute path to the container's OCI bundle directory.
    pub bundle: PathBuf,
    /// Init process pid, once the container has been started.
    pub pid: Option<i32>,
    /// Current lifecycle state.
    pub state: ContainerState,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Time the init process exited, if it has.
    pub finished_at: Option<DateTime<Utc>>,
    /// Exit code of the init process, if it has exited.
    pub exit_code: Option<i32>,
}

impl Container {
    /// Creates a new container record with a generated ID.
    #[must_use]
    pub fn new(name: impl Into<String>, bundle: impl Into<PathBuf>) -> Self {
        let id = Uuid::new_v4().simple().to_string()[..12].to_string();
        Self::with_id(id, name, bundle)
    }

    /// Creates a container record with an explicit ID.
    #[must_use]
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        bundle: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            bundle: bundle.into(),
            pid: None,
            state: ContainerState::Created,
            created: Utc::now(),
            finished_at: None,
            exit_code: None,
        }
    }

    /// Returns whether the container is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }

    /// Returns whether the container is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state == ContainerState::Paused
    }

    /// Returns whether the container has stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state == ContainerState::Stopped
    }

    /// Sets the lifecycle state.
    pub fn set_state(&mut self, state: ContainerState) {
        self.state = state;
    }

    /// Records the init process pid.
    pub fn set_pid(&mut self, pid: i32) {
        self.pid = Some(pid);
    }

    /// Records the init process exit.
    pub fn record_exit(&mut self, exit_code: i32) {
        self.exit_code = Some(exit_code);
        self.finished_at = Some(Utc::now());
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_container_defaults() {
        let ctr = Container::new("web", "/run/bundles/web");
        assert_eq!(ctr.id.len(), 12);
        assert_eq!(ctr.state, ContainerState::Created);
        assert!(ctr.pid.is_none());
        assert!(ctr.exit_code.is_none());
    }

    #[test]
    fn test_record_exit() {
        let mut ctr = Container::with_id("ctr-1", "web", "/run/bundles/web");
        ctr.record_exit(137);
        assert_eq!(ctr.exit_code, Some(137));
        assert!(ctr.finished_at.is_some());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut ctr = Container::with_id("ctr-1", "web", "/run/bundles/web");
        ctr.set_pid(4242);
        ctr.set_state(ContainerState::Running);

        let json = serde_json::to_string(&ctr).unwrap();
        let back: Container = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "ctr-1");
        assert_eq!(back.pid, Some(4242));
        assert_eq!(back.state, ContainerState::Running);
    }
}
