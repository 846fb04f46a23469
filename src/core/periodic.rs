//! Named periodic tasks and the registry that owns their dispatchers.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::task::{boxed_task_fn, TaskFn};
use super::{AppResult, RetryPolicy, Task, TaskContext};
use crate::util::serde::Priority;

struct PeriodicState {
    last_run: Instant,
    /// An invocation is waiting in the queue and has not begun yet.
    pending: bool,
    executions: u64,
}

/// A task that re-runs every `interval`, measured from when its last execution began.
pub struct PeriodicTask {
    name: String,
    priority: Priority,
    retry_policy: RetryPolicy,
    interval: Duration,
    state: Mutex<PeriodicState>,
    run: Box<TaskFn>,
}

impl PeriodicTask {
    /// Create a periodic task. `last_run` starts at now, so the first run is one
    /// interval away.
    pub fn new<F, Fut>(name: impl Into<String>, interval: Duration, f: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            priority: Priority::Normal,
            retry_policy: RetryPolicy::default(),
            interval,
            state: Mutex::new(PeriodicState {
                last_run: Instant::now(),
                pending: false,
                executions: 0,
            }),
            run: boxed_task_fn(f),
        }
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Interval between execution starts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// When the most recent execution began (or registration time).
    #[must_use]
    pub fn last_run(&self) -> Instant {
        self.state.lock().last_run
    }

    /// Executions begun so far, retries included.
    #[must_use]
    pub fn executions(&self) -> u64 {
        self.state.lock().executions
    }

    /// Due and not already waiting in the queue.
    #[must_use]
    pub fn should_run(&self) -> bool {
        let state = self.state.lock();
        !state.pending && state.last_run.elapsed() >= self.interval
    }

    /// Atomically check `should_run` and mark the task as pending.
    pub(crate) fn try_claim(&self) -> bool {
        let mut state = self.state.lock();
        if state.pending || state.last_run.elapsed() < self.interval {
            return false;
        }
        state.pending = true;
        true
    }

    /// Undo a claim whose submission did not go through.
    pub(crate) fn release_claim(&self) {
        self.state.lock().pending = false;
    }

    /// Time left until due; `None` while an invocation is pending.
    pub(crate) fn time_until_due(&self) -> Option<Duration> {
        let state = self.state.lock();
        if state.pending {
            return None;
        }
        Some(self.interval.saturating_sub(state.last_run.elapsed()))
    }
}

impl fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Task for PeriodicTask {
    async fn execute(&self, ctx: &TaskContext) -> AppResult<()> {
        {
            let mut state = self.state.lock();
            state.last_run = Instant::now();
            state.pending = false;
            state.executions += 1;
        }
        (self.run)(ctx.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }
}

/// Caller-side view of a registered periodic task.
#[derive(Debug, Clone)]
pub struct PeriodicHandle {
    id: Uuid,
    task: Arc<PeriodicTask>,
    token: CancellationToken,
}

impl PeriodicHandle {
    /// Registration identifier; changes when a name is re-registered.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Interval between execution starts.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.task.interval()
    }

    /// When the most recent execution began.
    #[must_use]
    pub fn last_run(&self) -> Instant {
        self.task.last_run()
    }

    /// Executions begun so far.
    #[must_use]
    pub fn executions(&self) -> u64 {
        self.task.executions()
    }

    /// Whether the handle was cancelled, replaced or the scheduler stopped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn task(&self) -> &Arc<PeriodicTask> {
        &self.task
    }

    pub(crate) const fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Name-keyed registry of periodic handles.
///
/// Its lock is scoped to the registry, so registration and cancellation never
/// contend with queue draining.
#[derive(Default)]
pub(crate) struct PeriodicRegistry {
    entries: Mutex<HashMap<String, PeriodicHandle>>,
}

impl PeriodicRegistry {
    /// Register `task`, returning the new handle and the one it displaced.
    /// The caller cancels the displaced handle.
    pub fn insert(
        &self,
        task: Arc<PeriodicTask>,
        token: CancellationToken,
    ) -> (PeriodicHandle, Option<PeriodicHandle>) {
        let handle = PeriodicHandle {
            id: Uuid::new_v4(),
            task,
            token,
        };
        let previous = self
            .entries
            .lock()
            .insert(handle.name().to_string(), handle.clone());
        (handle, previous)
    }

    pub fn remove(&self, name: &str) -> Option<PeriodicHandle> {
        self.entries.lock().remove(name)
    }

    /// Remove `name` only if it still maps to registration `id`.
    pub fn remove_if(&self, name: &str, id: Uuid) -> Option<PeriodicHandle> {
        let mut entries = self.entries.lock();
        if entries.get(name).is_some_and(|h| h.id == id) {
            return entries.remove(name);
        }
        None
    }

    pub fn clear(&self) -> Vec<PeriodicHandle> {
        self.entries.lock().drain().map(|(_, h)| h).collect()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn periodic(name: &str, interval: Duration) -> Arc<PeriodicTask> {
        Arc::new(PeriodicTask::new(name, interval, |_| async { Ok(()) }))
    }

    #[test]
    fn test_should_run_after_interval() {
        let task = periodic("tick", Duration::from_millis(20));
        assert!(!task.should_run());
        thread::sleep(Duration::from_millis(30));
        assert!(task.should_run());
    }

    #[test]
    fn test_claim_blocks_until_execution_begins() {
        let task = periodic("tick", Duration::ZERO);
        assert!(task.try_claim());
        assert!(!task.try_claim());
        assert!(!task.should_run());
        assert_eq!(task.time_until_due(), None);

        task.release_claim();
        assert!(task.should_run());
    }

    #[tokio::test]
    async fn test_execute_resets_last_run() {
        let task = periodic("tick", Duration::from_secs(3600));
        let registered = task.last_run();
        assert!(!task.try_claim());

        tokio::time::sleep(Duration::from_millis(5)).await;
        let ctx = TaskContext::new(CancellationToken::new());
        task.execute(&ctx).await.unwrap();

        assert!(task.last_run() > registered);
        assert_eq!(task.executions(), 1);
        assert!(!task.should_run());
    }

    #[test]
    fn test_registry_replaces_duplicate_names() {
        let registry = PeriodicRegistry::default();
        let (first, displaced) =
            registry.insert(periodic("book", Duration::from_secs(60)), CancellationToken::new());
        assert!(displaced.is_none());

        let (second, displaced) =
            registry.insert(periodic("book", Duration::from_secs(30)), CancellationToken::new());
        let displaced = displaced.unwrap();
        assert_eq!(displaced.id(), first.id());
        assert_ne!(second.id(), first.id());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["book".to_string()]);

        assert!(registry.remove("book").is_some());
        assert!(registry.remove("book").is_none());
    }
}
