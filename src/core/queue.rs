//! Bounded queue abstraction shared by producers and workers.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::Task;
use crate::util::serde::{Priority, TaskId};

/// A task admitted to the queue, waiting for a worker.
pub struct QueuedJob {
    /// Submission identifier.
    pub id: TaskId,
    /// The task to run.
    pub task: Arc<dyn Task>,
    /// Caller/timer cancellation token for this submission.
    pub token: CancellationToken,
    /// Priority captured at submission time.
    pub priority: Priority,
    /// Admission time.
    pub enqueued_at: Instant,
}

impl QueuedJob {
    /// Wrap `task` for submission `id`.
    #[must_use]
    pub fn new(id: TaskId, task: Arc<dyn Task>, token: CancellationToken) -> Self {
        let priority = task.priority();
        Self {
            id,
            task,
            token,
            priority,
            enqueued_at: Instant::now(),
        }
    }
}

impl fmt::Debug for QueuedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedJob")
            .field("id", &self.id)
            .field("task", &self.task.name())
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Why a push did not admit the job. The job is handed back.
#[derive(Debug)]
pub enum PushError {
    /// Queue at capacity.
    Full(QueuedJob),
    /// Queue closed by shutdown.
    Closed(QueuedJob),
}

impl PushError {
    /// Recover the job that was not admitted.
    #[must_use]
    pub fn into_job(self) -> QueuedJob {
        match self {
            Self::Full(job) | Self::Closed(job) => job,
        }
    }
}

/// Abstraction for bounded queue backends.
///
/// Pushes never block unless the caller explicitly asks for a timeout. `pop`
/// blocks the calling worker thread until a job arrives or the queue is closed.
pub trait TaskQueue: Send + Sync {
    /// Enqueue without blocking.
    ///
    /// # Errors
    ///
    /// `PushError::Full` at capacity, `PushError::Closed` after `close`.
    fn try_push(&self, job: QueuedJob) -> Result<(), PushError>;

    /// Enqueue, waiting up to `timeout` for capacity.
    ///
    /// # Errors
    ///
    /// `PushError::Full` if no capacity freed up in time, `PushError::Closed`
    /// after `close`.
    fn push_timeout(&self, job: QueuedJob, timeout: Duration) -> Result<(), PushError>;

    /// Block until the next job is available. After `close`, jobs still waiting
    /// are handed out, then `None`.
    fn pop(&self) -> Option<QueuedJob>;

    /// Remove and return every job still waiting.
    fn drain(&self) -> Vec<QueuedJob>;

    /// Refuse further pushes and wake blocked consumers.
    fn close(&self);

    /// Jobs currently waiting.
    fn len(&self) -> usize;

    /// Fixed capacity.
    fn capacity(&self) -> usize;

    /// No jobs waiting.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
