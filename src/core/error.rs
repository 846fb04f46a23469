//! Error types for scheduler operations.

use std::time::Duration;

use thiserror::Error;

use super::SchedulerState;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Queue was full at submission time; the task was not admitted.
    #[error("queue full: task `{task}` rejected (capacity {capacity})")]
    QueueFull {
        /// Name of the rejected task.
        task: String,
        /// Configured queue capacity.
        capacity: usize,
    },
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Requested lifecycle transition is not allowed.
    #[error("invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: SchedulerState,
        /// Requested state.
        to: SchedulerState,
    },
    /// Operation requires a running scheduler.
    #[error("scheduler is not running (state: {0})")]
    NotRunning(SchedulerState),
    /// Scheduler is stopping or stopped; no new work is admitted.
    #[error("scheduler is shutting down")]
    ShuttingDown,
    /// Timer interval must be non-zero.
    #[error("invalid interval: {0:?}")]
    InvalidInterval(Duration),
    /// No periodic task registered under the name.
    #[error("periodic task not found: {0}")]
    PeriodicNotFound(String),
    /// Internal failure (thread spawn, runtime construction).
    #[error("internal error: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// True for the rejection outcome (queue full).
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }
}

/// Application-facing result using anyhow for task bodies and higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
