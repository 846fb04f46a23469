//! Task abstraction, retry policy and execution context.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::AppResult;
use crate::util::serde::Priority;

/// Retry strategy for a task.
///
/// A task is attempted at most `max_retries + 1` times. Before retry `n`
/// (zero-based) the worker waits `backoff_base * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base backoff duration.
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Construct a policy.
    #[must_use]
    pub const fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Single attempt, no retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Exponential backoff before retrying after failed attempt `attempt` (zero-based).
    ///
    /// Saturates at `Duration::MAX`.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.backoff_base.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Total attempts this policy allows.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    /// Three retries starting at 500ms, the policy used by the data collection jobs.
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Cancellation-aware context handed to [`Task::execute`].
///
/// Cancelled when either the caller's token or the scheduler's shutdown token fires.
#[derive(Debug, Clone)]
pub struct TaskContext {
    token: CancellationToken,
    shutdown: CancellationToken,
    attempt: u32,
}

impl TaskContext {
    /// Context driven only by `token`.
    #[must_use]
    pub fn new(token: CancellationToken) -> Self {
        Self::with_shutdown(token, CancellationToken::new())
    }

    pub(crate) const fn with_shutdown(
        token: CancellationToken,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            token,
            shutdown,
            attempt: 0,
        }
    }

    pub(crate) fn for_attempt(&self, attempt: u32) -> Self {
        Self {
            token: self.token.clone(),
            shutdown: self.shutdown.clone(),
            attempt,
        }
    }

    /// Whether cancellation or shutdown has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.shutdown.is_cancelled()
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        tokio::select! {
            () = self.token.cancelled() => {}
            () = self.shutdown.cancelled() => {}
        }
    }

    /// Zero-based attempt number of the current execution.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// A named, prioritized, retryable unit of work.
///
/// The scheduler only ever calls through this trait; what `execute` does is opaque.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_task_engine::core::{AppResult, Task, TaskContext};
///
/// struct FetchTicker { symbol: String }
///
/// #[async_trait]
/// impl Task for FetchTicker {
///     async fn execute(&self, ctx: &TaskContext) -> AppResult<()> {
///         if ctx.is_cancelled() {
///             anyhow::bail!("cancelled");
///         }
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         &self.symbol
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Run the task once.
    ///
    /// Long-running bodies should watch `ctx` and return early when it is cancelled.
    async fn execute(&self, ctx: &TaskContext) -> AppResult<()>;

    /// Task name, used for logging, reports and periodic registration.
    fn name(&self) -> &str;

    /// Priority metadata.
    fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Retry strategy applied by the worker.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }
}

/// Boxed future returned by closure-backed tasks.
pub type TaskFuture = Pin<Box<dyn Future<Output = AppResult<()>> + Send + 'static>>;

pub(crate) type TaskFn = dyn Fn(TaskContext) -> TaskFuture + Send + Sync;

pub(crate) fn boxed_task_fn<F, Fut>(f: F) -> Box<TaskFn>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    Box::new(move |ctx| Box::pin(f(ctx)))
}

/// One-shot task backed by a closure.
pub struct FnTask {
    name: String,
    priority: Priority,
    retry_policy: RetryPolicy,
    run: Box<TaskFn>,
}

impl FnTask {
    /// Create a task named `name` that runs `f` on every attempt.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            priority: Priority::Normal,
            retry_policy: RetryPolicy::default(),
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
}

impl fmt::Debug for FnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Task for FnTask {
    async fn execute(&self, ctx: &TaskContext) -> AppResult<()> {
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
