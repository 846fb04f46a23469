//! Execution outcomes and the reports delivered to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::serde::{Priority, TaskId};

/// Result of handing a task to the engine.
#[derive(Debug)]
pub enum TaskOutcome {
    /// Task succeeded on the last of `attempts` attempts.
    Succeeded {
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// Every allowed attempt failed.
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Error returned by the final attempt.
        last_error: anyhow::Error,
    },
    /// Context was cancelled before or during execution/backoff.
    Cancelled {
        /// Attempts started before cancellation was observed.
        attempts: u32,
    },
    /// Queue was full when a timer tried to submit the task.
    Rejected,
}

impl TaskOutcome {
    /// Attempts made for this outcome.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts }
            | Self::RetriesExhausted { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
            Self::Rejected => 0,
        }
    }

    /// Fieldless discriminant, for counting and logging.
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::Succeeded { .. } => OutcomeKind::Succeeded,
            Self::RetriesExhausted { .. } => OutcomeKind::RetriesExhausted,
            Self::Cancelled { .. } => OutcomeKind::Cancelled,
            Self::Rejected => OutcomeKind::Rejected,
        }
    }

    /// True for `Succeeded`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded { attempts } => write!(f, "succeeded after {attempts} attempt(s)"),
            Self::RetriesExhausted {
                attempts,
                last_error,
            } => write!(f, "failed after {attempts} attempt(s): {last_error}"),
            Self::Cancelled { attempts } => write!(f, "cancelled after {attempts} attempt(s)"),
            Self::Rejected => write!(f, "rejected: queue full"),
        }
    }
}

/// Outcome discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// See [`TaskOutcome::Succeeded`].
    Succeeded,
    /// See [`TaskOutcome::RetriesExhausted`].
    RetriesExhausted,
    /// See [`TaskOutcome::Cancelled`].
    Cancelled,
    /// See [`TaskOutcome::Rejected`].
    Rejected,
}

/// Outcome of one submission, delivered on [`Scheduler::reports`](crate::core::Scheduler::reports).
#[derive(Debug)]
pub struct TaskReport {
    /// Submission identifier; `None` for timer submissions that were rejected.
    pub id: Option<TaskId>,
    /// Task name.
    pub name: String,
    /// Task priority at submission time.
    pub priority: Priority,
    /// What happened.
    pub outcome: TaskOutcome,
    /// Completion time in milliseconds since epoch.
    pub finished_at_ms: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        let ok = TaskOutcome::Succeeded { attempts: 2 };
        assert_eq!(ok.to_string(), "succeeded after 2 attempt(s)");
        assert!(ok.is_success());

        let failed = TaskOutcome::RetriesExhausted {
            attempts: 4,
            last_error: anyhow::anyhow!("connection reset"),
        };
        assert_eq!(failed.to_string(), "failed after 4 attempt(s): connection reset");
        assert_eq!(failed.kind(), OutcomeKind::RetriesExhausted);

        assert_eq!(TaskOutcome::Rejected.attempts(), 0);
        assert_eq!(TaskOutcome::Cancelled { attempts: 1 }.attempts(), 1);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&OutcomeKind::RetriesExhausted).unwrap();
        assert_eq!(json, "\"retries_exhausted\"");
    }
}
