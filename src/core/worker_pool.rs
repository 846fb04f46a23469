//! Worker threads draining the shared queue.
//!
//! Each worker is a dedicated OS thread with its own single-threaded tokio
//! runtime, so task bodies (including blocking I/O) occupy only their own
//! worker slot. Workers block on `TaskQueue::pop`; closing the queue wakes them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    execute_with_retry, PushError, QueuedJob, SchedulerError, Task, TaskContext, TaskOutcome,
    TaskQueue, TaskReport,
};
use crate::util::clock::now_ms;
use crate::util::serde::TaskId;

/// Statistics about scheduler utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Queue capacity.
    pub queue_capacity: usize,
    /// Tasks waiting in the queue.
    pub queued_tasks: usize,
    /// Tasks currently executing (including backoff sleeps).
    pub active_tasks: u64,
    /// Tasks admitted to the queue.
    pub submitted_tasks: u64,
    /// Submissions rejected because the queue was full.
    pub rejected_tasks: u64,
    /// Tasks that succeeded.
    pub succeeded_tasks: u64,
    /// Tasks that exhausted their retries.
    pub failed_tasks: u64,
    /// Tasks cancelled before completing.
    pub cancelled_tasks: u64,
    /// Retries performed across all tasks.
    pub retries: u64,
    /// Registered periodic tasks.
    pub periodic_tasks: usize,
    /// Reports discarded because the report channel was full.
    pub dropped_reports: u64,
}

/// Internal counters for scheduler statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct SchedulerCounters {
    pub active_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
    pub rejected_tasks: AtomicU64,
    pub succeeded_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub cancelled_tasks: AtomicU64,
    pub retries: AtomicU64,
    pub dropped_reports: AtomicU64,
}

impl SchedulerCounters {
    fn record(&self, outcome: &TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Succeeded { .. } => &self.succeeded_tasks,
            TaskOutcome::RetriesExhausted { .. } => &self.failed_tasks,
            TaskOutcome::Cancelled { .. } => &self.cancelled_tasks,
            TaskOutcome::Rejected => &self.rejected_tasks,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let retries = outcome.attempts().saturating_sub(1);
        if retries > 0 {
            self.retries.fetch_add(u64::from(retries), Ordering::Relaxed);
        }
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(
        &self,
        worker_count: usize,
        queue_capacity: usize,
        queued_tasks: usize,
    ) -> SchedulerStats {
        SchedulerStats {
            worker_count,
            queue_capacity,
            queued_tasks,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            rejected_tasks: self.rejected_tasks.load(Ordering::Relaxed),
            succeeded_tasks: self.succeeded_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            cancelled_tasks: self.cancelled_tasks.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            periodic_tasks: 0,
            dropped_reports: self.dropped_reports.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the facade, workers and timers.
pub(crate) struct PoolShared {
    pub queue: Arc<dyn TaskQueue>,
    pub counters: SchedulerCounters,
    pub reports: Sender<TaskReport>,
    /// Broadcast to running tasks, backoff sleeps and timers.
    pub shutdown: CancellationToken,
    stopping: AtomicBool,
    next_id: AtomicU64,
}

impl PoolShared {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        reports: Sender<TaskReport>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            counters: SchedulerCounters::default(),
            reports,
            shutdown,
            stopping: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Flag shutdown, cancel the broadcast token and close the queue.
    /// Returns false if shutdown was already signalled.
    pub fn signal_shutdown(&self) -> bool {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.shutdown.cancel();
        self.queue.close();
        true
    }

    /// Non-blocking enqueue.
    pub fn submit(
        &self,
        task: Arc<dyn Task>,
        token: CancellationToken,
    ) -> Result<TaskId, SchedulerError> {
        self.admit(task, token, |queue, job| queue.try_push(job))
    }

    /// Enqueue, waiting up to `timeout` for capacity.
    pub fn submit_timeout(
        &self,
        task: Arc<dyn Task>,
        token: CancellationToken,
        timeout: std::time::Duration,
    ) -> Result<TaskId, SchedulerError> {
        self.admit(task, token, |queue, job| queue.push_timeout(job, timeout))
    }

    fn admit<F>(
        &self,
        task: Arc<dyn Task>,
        token: CancellationToken,
        push: F,
    ) -> Result<TaskId, SchedulerError>
    where
        F: FnOnce(&dyn TaskQueue, QueuedJob) -> Result<(), PushError>,
    {
        if self.is_stopping() {
            return Err(SchedulerError::ShuttingDown);
        }

        let task_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let job = QueuedJob::new(task_id, task, token);

        match push(self.queue.as_ref(), job) {
            Ok(()) => {
                self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(task_id = task_id, "Task submitted to queue");
                Ok(task_id)
            }
            Err(PushError::Full(job)) => {
                self.counters.rejected_tasks.fetch_add(1, Ordering::Relaxed);
                warn!(task = job.task.name(), "Queue is full, task rejected");
                Err(SchedulerError::QueueFull {
                    task: job.task.name().to_string(),
                    capacity: self.queue.capacity(),
                })
            }
            Err(PushError::Closed(_)) => Err(SchedulerError::ShuttingDown),
        }
    }

    /// Record an outcome and deliver it to the report channel.
    pub fn finish(&self, id: Option<TaskId>, task: &dyn Task, outcome: TaskOutcome) {
        self.counters.record(&outcome);
        self.report(id, task, outcome);
    }

    /// Deliver an outcome without touching the counters.
    pub fn report(&self, id: Option<TaskId>, task: &dyn Task, outcome: TaskOutcome) {
        let report = TaskReport {
            id,
            name: task.name().to_string(),
            priority: task.priority(),
            outcome,
            finished_at_ms: now_ms(),
        };
        match self.reports.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(report)) => {
                self.counters.dropped_reports.fetch_add(1, Ordering::Relaxed);
                debug!(task = %report.name, "Report channel full, report dropped");
            }
            Err(TrySendError::Disconnected(_)) => debug!("Report receiver dropped"),
        }
    }
}

/// Spawn a worker thread.
pub(crate) fn spawn_worker(
    worker_id: usize,
    shared: Arc<PoolShared>,
    stack_size: usize,
) -> Result<JoinHandle<()>, std::io::Error> {
    // Each worker has its own single-threaded tokio runtime
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name(format!("sched-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id = worker_id, "Worker thread started");

            // Blocking pop, NO POLLING. Returns None once the queue is closed and empty.
            while let Some(job) = shared.queue.pop() {
                // Queued-but-undrained work is abandoned on shutdown
                if shared.is_stopping() {
                    debug!(
                        worker_id = worker_id,
                        task_id = job.id,
                        "Worker shutting down, abandoning task"
                    );
                    let abandoned = TaskOutcome::Cancelled { attempts: 0 };
                    shared.finish(Some(job.id), job.task.as_ref(), abandoned);
                    continue;
                }

                shared.counters.active_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(
                    worker_id = worker_id,
                    task_id = job.id,
                    task = job.task.name(),
                    priority = %job.priority,
                    waited_ms = u64::try_from(job.enqueued_at.elapsed().as_millis())
                        .unwrap_or(u64::MAX),
                    "Worker executing task"
                );

                let ctx = TaskContext::with_shutdown(job.token.clone(), shared.shutdown.clone());
                let outcome = rt.block_on(execute_with_retry(job.task.as_ref(), &ctx));

                debug!(
                    worker_id = worker_id,
                    task_id = job.id,
                    outcome = ?outcome.kind(),
                    "Worker completed task"
                );

                shared.counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
                shared.finish(Some(job.id), job.task.as_ref(), outcome);
            }

            debug!(worker_id = worker_id, "Worker thread exiting");
        })
}
