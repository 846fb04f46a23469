//! Scheduler lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::SchedulerError;

/// Lifecycle of a [`Scheduler`](crate::core::Scheduler).
///
/// `Created -> Running -> Stopping -> Stopped`. A never-started scheduler may go
/// straight from `Created` to `Stopped`. There is no way back from `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Constructed, workers not spawned yet.
    Created,
    /// Workers and timer thread are live.
    Running,
    /// Shutdown broadcast, waiting for workers and timers to exit.
    Stopping,
    /// Every spawned thread has been joined.
    Stopped,
}

impl SchedulerState {
    /// Validate and perform a transition to `to`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidTransition` if the state machine forbids it.
    pub fn transition(self, to: Self) -> Result<Self, SchedulerError> {
        match (self, to) {
            (Self::Created, Self::Running | Self::Stopped)
            | (Self::Running, Self::Stopping)
            | (Self::Stopping, Self::Stopped) => Ok(to),
            (from, to) => Err(SchedulerError::InvalidTransition { from, to }),
        }
    }

    /// Whether new work may be queued in this state.
    #[must_use]
    pub const fn accepts_submissions(self) -> bool {
        matches!(self, Self::Created | Self::Running)
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}
