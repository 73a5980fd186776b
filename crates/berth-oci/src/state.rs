//! Container lifecycle states.

use serde::{Deserialize, Serialize};

/// Container lifecycle state.
///
/// Valid transitions:
/// - `Created -> Running`
/// - `Running <-> Paused`
/// - `{Created, Running, Paused} -> Stopped` (terminal)
///
/// `Unknown` is a transient error state reached only when the runtime's view
/// of a container could not be determined; it may transition to anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Container created but not started.
    #[default]
    Created,
    /// Container is running.
    Running,
    /// Container is paused.
    Paused,
    /// Container has stopped (terminal).
    Stopped,
    /// Container state could not be determined.
    Unknown,
}

impl ContainerState {
    /// Returns the state string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }

    /// Checks whether a transition to `target` is valid.
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::Running | Self::Stopped)
                | (Self::Running, Self::Paused | Self::Stopped)
                | (Self::Paused, Self::Running | Self::Stopped)
                | (Self::Unknown, _)
        )
    }

    /// Returns true for the terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
