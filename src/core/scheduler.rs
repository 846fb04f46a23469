//! Scheduling facade: lifecycle, submission, timers and the periodic registry.

use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::periodic::PeriodicRegistry;
use super::timers::{run_delayed, run_periodic, run_recurring};
use super::worker_pool::{spawn_worker, PoolShared};
use super::{
    AppResult, PeriodicHandle, PeriodicTask, SchedulerError, SchedulerState, SchedulerStats, Task,
    TaskContext, TaskOutcome, TaskQueue, TaskReport, TimerHandle,
};
use crate::builders::SchedulerBuilder;
use crate::config::SchedulerConfig;
use crate::runtime::TimerRuntime;
use crate::util::serde::{Priority, TaskId};

/// Bounded worker pool with one-shot, delayed, recurring and periodic scheduling.
///
/// Construct one explicitly and pass it where it is needed; there is no global
/// instance. Every method takes `&self` and is safe to call from any thread.
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use std::time::Duration;
/// use prometheus_task_engine::config::SchedulerConfig;
/// use prometheus_task_engine::core::{FnTask, Scheduler};
/// use prometheus_task_engine::util::Priority;
/// use tokio_util::sync::CancellationToken;
///
/// let scheduler = Scheduler::new(
///     SchedulerConfig::new().with_worker_count(5).with_queue_capacity(50),
/// )?;
/// scheduler.start()?;
///
/// let ctx = CancellationToken::new();
/// scheduler.schedule(&ctx, Arc::new(FnTask::new("warmup", |_| async { Ok(()) })))?;
/// scheduler.register_periodic(
///     "FundingBook_fUSD",
///     Duration::from_secs(60),
///     |_| async { Ok(()) },
///     Priority::High,
/// )?;
///
/// for report in scheduler.reports().try_iter() {
///     println!("{}: {}", report.name, report.outcome);
/// }
/// scheduler.stop();
/// ```
pub struct Scheduler {
    config: SchedulerConfig,
    shared: Arc<PoolShared>,
    state: RwLock<SchedulerState>,
    /// Serializes concurrent `stop` calls so none returns before the join completes.
    stop_lock: Mutex<()>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    timers: Mutex<Option<TimerRuntime>>,
    registry: PeriodicRegistry,
    reports: Receiver<TaskReport>,
}

impl Scheduler {
    /// Create a scheduler in the `Created` state.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if `worker_count` or
    /// `queue_capacity` is zero.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        SchedulerBuilder::new(config).build()
    }

    pub(crate) fn from_parts(
        config: SchedulerConfig,
        queue: Arc<dyn TaskQueue>,
        shutdown: CancellationToken,
    ) -> Self {
        let (report_tx, report_rx) = crossbeam_channel::bounded(config.report_capacity);
        Self {
            config,
            shared: Arc::new(PoolShared::new(queue, report_tx, shutdown)),
            state: RwLock::new(SchedulerState::Created),
            stop_lock: Mutex::new(()),
            workers: Mutex::new(Vec::new()),
            timers: Mutex::new(None),
            registry: PeriodicRegistry::default(),
            reports: report_rx,
        }
    }

    /// Spawn the worker threads and the timer thread.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::InvalidTransition` unless the scheduler is `Created`
    /// - `SchedulerError::Internal` if a thread cannot be spawned; the
    ///   scheduler is then `Stopped`
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut state = self.state.write();
        let next = state.transition(SchedulerState::Running)?;

        // Also fires when the shutdown token is cancelled through a parent token.
        let watched = Arc::clone(&self.shared);
        let on_shutdown = move || {
            if watched.signal_shutdown() {
                info!("Shutdown token cancelled, scheduler no longer accepting work");
            }
        };
        let timers = match TimerRuntime::start(self.shared.shutdown.clone(), on_shutdown) {
            Ok(timers) => timers,
            Err(e) => {
                error!(error = %e, "Failed to start timer thread");
                self.shared.signal_shutdown();
                self.abandon_queued();
                *state = SchedulerState::Stopped;
                return Err(SchedulerError::Internal(format!("timer thread: {e}")));
            }
        };

        let mut workers = Vec::with_capacity(self.config.worker_count);
        for worker_id in 0..self.config.worker_count {
            let shared = Arc::clone(&self.shared);
            match spawn_worker(worker_id, shared, self.config.thread_stack_size) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    error!(worker_id = worker_id, error = %e, "Failed to spawn worker thread");
                    self.shared.signal_shutdown();
                    for worker in workers {
                        let _ = worker.join();
                    }
                    timers.join();
                    self.abandon_queued();
                    *state = SchedulerState::Stopped;
                    return Err(SchedulerError::Internal(format!(
                        "worker thread {worker_id}: {e}"
                    )));
                }
            }
        }

        *self.workers.lock() = workers;
        *self.timers.lock() = Some(timers);
        *state = next;

        info!(
            worker_count = self.config.worker_count,
            queue_capacity = self.shared.queue.capacity(),
            ordering = ?self.config.ordering,
            "Scheduler started"
        );
        Ok(())
    }

    /// Stop the scheduler and wait for every thread it spawned.
    ///
    /// Broadcasts shutdown to workers, backoff sleeps and timers, then joins
    /// them. Workers finish the task they are running; tasks still queued are
    /// abandoned and reported as `Cancelled { attempts: 0 }`. Calling `stop`
    /// again is a no-op.
    pub fn stop(&self) {
        let _stopping = self.stop_lock.lock();

        {
            let mut state = self.state.write();
            match *state {
                SchedulerState::Stopping | SchedulerState::Stopped => return,
                SchedulerState::Created => {
                    self.shared.signal_shutdown();
                    let abandoned = self.abandon_queued();
                    *state = SchedulerState::Stopped;
                    info!(abandoned = abandoned, "Scheduler stopped before start");
                    return;
                }
                SchedulerState::Running => *state = SchedulerState::Stopping,
            }
        }

        info!("Stopping scheduler");
        self.shared.signal_shutdown();
        for handle in self.registry.clear() {
            handle.token().cancel();
        }

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        let worker_count = workers.len();
        for (idx, worker) in workers.into_iter().enumerate() {
            if worker.join().is_ok() {
                debug!(worker_id = idx, "Worker joined successfully");
            } else {
                warn!(worker_id = idx, "Worker panicked");
            }
        }

        if let Some(timers) = self.timers.lock().take() {
            timers.join();
        }

        let abandoned = self.abandon_queued();
        *self.state.write() = SchedulerState::Stopped;
        info!(worker_count = worker_count, abandoned = abandoned, "Scheduler stopped");
    }

    fn abandon_queued(&self) -> usize {
        let jobs = self.shared.queue.drain();
        let count = jobs.len();
        for job in jobs {
            self.shared
                .finish(Some(job.id), job.task.as_ref(), TaskOutcome::Cancelled { attempts: 0 });
        }
        count
    }

    /// Non-blocking enqueue.
    ///
    /// Allowed while `Created` (the task waits for `start`) or `Running`.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::QueueFull` if the queue is at capacity (the rejection outcome)
    /// - `SchedulerError::ShuttingDown` once `stop` has begun
    pub fn submit_task(&self, task: Arc<dyn Task>) -> Result<TaskId, SchedulerError> {
        self.submit_with_token(task, CancellationToken::new())
    }

    /// Enqueue, waiting up to `timeout` for queue capacity before rejecting.
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::submit_task`].
    pub fn submit_task_blocking(
        &self,
        task: Arc<dyn Task>,
        timeout: Duration,
    ) -> Result<TaskId, SchedulerError> {
        let state = self.state.read();
        if !state.accepts_submissions() {
            return Err(SchedulerError::ShuttingDown);
        }
        drop(state);
        self.shared.submit_timeout(task, CancellationToken::new(), timeout)
    }

    fn submit_with_token(
        &self,
        task: Arc<dyn Task>,
        token: CancellationToken,
    ) -> Result<TaskId, SchedulerError> {
        let state = self.state.read();
        if !state.accepts_submissions() {
            return Err(SchedulerError::ShuttingDown);
        }
        self.shared.submit(task, token)
    }

    /// Enqueue `task` once. Cancelling `ctx` cancels the execution context
    /// handed to the task; if it is cancelled before a worker picks the task
    /// up, the task is reported as cancelled without running.
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::submit_task`].
    pub fn schedule(
        &self,
        ctx: &CancellationToken,
        task: Arc<dyn Task>,
    ) -> Result<TaskId, SchedulerError> {
        self.submit_with_token(task, ctx.clone())
    }

    /// Submit `task` once after `delay`, unless `ctx` or the returned handle is
    /// cancelled first.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::NotRunning` unless the scheduler is `Running`
    /// - `SchedulerError::ShuttingDown` once shutdown has been signalled
    pub fn schedule_with_delay(
        &self,
        ctx: &CancellationToken,
        task: Arc<dyn Task>,
        delay: Duration,
    ) -> Result<TimerHandle, SchedulerError> {
        let handle = TimerHandle::new(task.name(), ctx.child_token());
        let shared = Arc::clone(&self.shared);
        let token = handle.token();
        self.spawn_timer(run_delayed(shared, task, token, delay))?;
        debug!(
            task = handle.name(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Delayed task scheduled"
        );
        Ok(handle)
    }

    /// Submit `task` every `interval` until `ctx` or the returned handle is
    /// cancelled, or the scheduler stops.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::InvalidInterval` for a zero interval
    /// - `SchedulerError::NotRunning` unless the scheduler is `Running`
    /// - `SchedulerError::ShuttingDown` once shutdown has been signalled
    pub fn schedule_recurring(
        &self,
        ctx: &CancellationToken,
        task: Arc<dyn Task>,
        interval: Duration,
    ) -> Result<TimerHandle, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(interval));
        }
        let handle = TimerHandle::new(task.name(), ctx.child_token());
        let shared = Arc::clone(&self.shared);
        let token = handle.token();
        self.spawn_timer(run_recurring(shared, task, token, interval))?;
        debug!(task = handle.name(), "Recurring task scheduled");
        Ok(handle)
    }

    /// Register a named periodic task running `run_fn` every `interval`,
    /// measured from when the previous execution began.
    ///
    /// A name that is already registered is replaced and its dispatcher stopped.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::InvalidInterval` for a zero interval
    /// - `SchedulerError::NotRunning` unless the scheduler is `Running`
    /// - `SchedulerError::ShuttingDown` once shutdown has been signalled
    pub fn register_periodic<F, Fut>(
        &self,
        name: impl Into<String>,
        interval: Duration,
        run_fn: F,
        priority: Priority,
    ) -> Result<PeriodicHandle, SchedulerError>
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        let task = PeriodicTask::new(name, interval, run_fn).with_priority(priority);
        self.register_periodic_task(task)
    }

    /// Register a fully configured [`PeriodicTask`].
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::register_periodic`].
    pub fn register_periodic_task(
        &self,
        task: PeriodicTask,
    ) -> Result<PeriodicHandle, SchedulerError> {
        if task.interval().is_zero() {
            return Err(SchedulerError::InvalidInterval(task.interval()));
        }

        let state = self.state.read();
        if *state != SchedulerState::Running {
            return Err(SchedulerError::NotRunning(*state));
        }
        let timers = self.timers.lock();
        let Some(timers) = timers.as_ref() else {
            return Err(SchedulerError::NotRunning(*state));
        };
        if self.shared.is_stopping() || timers.is_closed() {
            return Err(SchedulerError::ShuttingDown);
        }

        let (handle, previous) = self
            .registry
            .insert(Arc::new(task), self.shared.shutdown.child_token());
        if let Some(previous) = previous {
            previous.token().cancel();
            info!(task = handle.name(), "Replaced periodic task registration");
        }

        let spawned = timers.spawn(run_periodic(
            Arc::clone(&self.shared),
            Arc::clone(handle.task()),
            handle.token().clone(),
            self.config.periodic_poll(),
        ));
        if let Err(e) = spawned {
            self.registry.remove_if(handle.name(), handle.id());
            handle.token().cancel();
            return Err(e);
        }

        info!(
            task = handle.name(),
            interval_ms = u64::try_from(handle.interval().as_millis()).unwrap_or(u64::MAX),
            "Periodic task registered"
        );
        Ok(handle)
    }

    /// Cancel the periodic task registered as `name`.
    ///
    /// After this returns no execution of `name` begins: the dispatcher is
    /// stopped and invocations still queued are reported as cancelled.
    ///
    /// # Errors
    ///
    /// `SchedulerError::PeriodicNotFound` if nothing is registered under `name`.
    pub fn cancel(&self, name: &str) -> Result<(), SchedulerError> {
        let handle = self
            .registry
            .remove(name)
            .ok_or_else(|| SchedulerError::PeriodicNotFound(name.to_string()))?;
        handle.token().cancel();
        info!(task = name, "Periodic task cancelled");
        Ok(())
    }

    /// Names of registered periodic tasks, sorted.
    #[must_use]
    pub fn periodic_names(&self) -> Vec<String> {
        self.registry.names()
    }

    fn spawn_timer<F>(&self, fut: F) -> Result<(), SchedulerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Holding the state lock keeps `stop` from closing the timer thread underneath us.
        let state = self.state.read();
        if *state != SchedulerState::Running {
            return Err(SchedulerError::NotRunning(*state));
        }
        let timers = self.timers.lock();
        let Some(timers) = timers.as_ref() else {
            return Err(SchedulerError::NotRunning(*state));
        };
        if self.shared.is_stopping() {
            return Err(SchedulerError::ShuttingDown);
        }
        timers.spawn(fut)
    }

    /// Receiver for task outcomes. Every clone shares the same stream.
    ///
    /// Holds at most `report_capacity` unread reports; the rest are dropped and
    /// counted in [`SchedulerStats::dropped_reports`](super::SchedulerStats).
    #[must_use]
    pub fn reports(&self) -> Receiver<TaskReport> {
        self.reports.clone()
    }

    /// A token cancelled when the scheduler shuts down, for callers that want
    /// their contexts tied to the scheduler's lifetime.
    #[must_use]
    pub fn context(&self) -> CancellationToken {
        self.shared.shutdown.child_token()
    }

    /// Current lifecycle state.
    ///
    /// A running scheduler whose shutdown token was cancelled through its parent
    /// reports `Stopping` until `stop` joins its threads.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        let state = *self.state.read();
        if state == SchedulerState::Running && self.shared.is_stopping() {
            return SchedulerState::Stopping;
        }
        state
    }

    /// Configuration the scheduler was built with.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Get current scheduler statistics.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self.shared.counters.snapshot(
            self.config.worker_count,
            self.shared.queue.capacity(),
            self.shared.queue.len(),
        );
        stats.periodic_tasks = self.registry.len();
        stats
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Signal shutdown but DON'T join: a task body that ignores cancellation
        // would hang the drop. Explicit stop() is required for a clean join.
        if self.shared.signal_shutdown() {
            debug!("Scheduler dropped without explicit stop - threads will be detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FnTask;

    fn config() -> SchedulerConfig {
        SchedulerConfig::new()
            .with_worker_count(1)
            .with_queue_capacity(2)
    }

    #[test]
    fn test_timers_require_running() {
        let scheduler = Scheduler::new(config()).unwrap();
        let task: Arc<dyn Task> = Arc::new(FnTask::new("later", |_| async { Ok(()) }));
        let err = scheduler
            .schedule_with_delay(&CancellationToken::new(), task, Duration::from_millis(5))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::NotRunning(SchedulerState::Created)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let scheduler = Scheduler::new(config()).unwrap();
        scheduler.start().unwrap();
        let task: Arc<dyn Task> = Arc::new(FnTask::new("spin", |_| async { Ok(()) }));
        let err = scheduler
            .schedule_recurring(&CancellationToken::new(), task, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidInterval(_)));
        let err = scheduler
            .register_periodic("spin", Duration::ZERO, |_| async { Ok(()) }, Priority::Low)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidInterval(_)));
        scheduler.stop();
    }

    #[test]
    fn test_stop_before_start_abandons_queue() {
        let scheduler = Scheduler::new(config()).unwrap();
        let task: Arc<dyn Task> = Arc::new(FnTask::new("never", |_| async { Ok(()) }));
        let id = scheduler.submit_task(task).unwrap();

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        let report = scheduler.reports().try_recv().unwrap();
        assert_eq!(report.id, Some(id));
        assert!(matches!(report.outcome, TaskOutcome::Cancelled { attempts: 0 }));
        assert!(scheduler.start().is_err());
    }

    #[test]
    fn test_cancel_unknown_name() {
        let scheduler = Scheduler::new(config()).unwrap();
        let err = scheduler.cancel("missing").unwrap_err();
        assert_eq!(err.to_string(), "periodic task not found: missing");
    }
}
