//! Timer futures feeding the shared queue: one-shot delay, recurring ticker,
//! and the per-handle periodic dispatcher.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::worker_pool::PoolShared;
use super::{PeriodicTask, SchedulerError, Task, TaskOutcome};

/// Handle to a delayed or recurring schedule.
///
/// Cancelling the handle (or the caller token it was derived from) stops the
/// timer; nothing is submitted after cancellation is observed.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: Uuid,
    name: String,
    token: CancellationToken,
}

impl TimerHandle {
    pub(crate) fn new(name: &str, token: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            token,
        }
    }

    /// Schedule identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Name of the scheduled task.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop this timer.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the timer was cancelled directly, through its parent token, or by shutdown.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// What a timer should do after trying to submit.
enum Fired {
    Submitted,
    Rejected,
    Shutdown,
}

/// Submit on behalf of a timer. Rejections cannot be returned to the caller,
/// so they are delivered on the report channel.
fn submit_from_timer(
    shared: &PoolShared,
    task: &Arc<dyn Task>,
    token: &CancellationToken,
) -> Fired {
    match shared.submit(Arc::clone(task), token.clone()) {
        Ok(task_id) => {
            debug!(task_id = task_id, task = task.name(), "Timer submitted task");
            Fired::Submitted
        }
        Err(SchedulerError::QueueFull { .. }) => {
            shared.report(None, task.as_ref(), TaskOutcome::Rejected);
            Fired::Rejected
        }
        Err(e) => {
            debug!(task = task.name(), error = %e, "Timer submission refused");
            Fired::Shutdown
        }
    }
}

pub(crate) async fn run_delayed(
    shared: Arc<PoolShared>,
    task: Arc<dyn Task>,
    token: CancellationToken,
    delay: Duration,
) {
    tokio::select! {
        biased;
        () = token.cancelled() => {
            debug!(task = task.name(), "Delayed task cancelled before firing");
            return;
        }
        () = shared.shutdown.cancelled() => return,
        () = tokio::time::sleep(delay) => {}
    }
    submit_from_timer(&shared, &task, &token);
}

pub(crate) async fn run_recurring(
    shared: Arc<PoolShared>,
    task: Arc<dyn Task>,
    token: CancellationToken,
    interval: Duration,
) {
    // First tick one interval from now, not immediately.
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            () = shared.shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if matches!(submit_from_timer(&shared, &task, &token), Fired::Shutdown) {
                    break;
                }
            }
        }
    }
    debug!(task = task.name(), "Recurring schedule stopped");
}

pub(crate) async fn run_periodic(
    shared: Arc<PoolShared>,
    task: Arc<PeriodicTask>,
    token: CancellationToken,
    poll: Duration,
) {
    let as_task: Arc<dyn Task> = task.clone();

    loop {
        let wait = task.time_until_due().unwrap_or(poll);
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            () = shared.shutdown.cancelled() => break,
            () = tokio::time::sleep(wait) => {}
        }

        if !task.try_claim() {
            continue;
        }

        match submit_from_timer(&shared, &as_task, &token) {
            Fired::Submitted => {}
            Fired::Rejected => {
                warn!(task = task.name(), "Periodic task rejected, retrying next interval check");
                task.release_claim();
                // Avoid spinning on a full queue.
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    () = shared.shutdown.cancelled() => break,
                    () = tokio::time::sleep(poll) => {}
                }
            }
            Fired::Shutdown => break,
        }
    }
    debug!(task = task.name(), "Periodic dispatcher stopped");
}
