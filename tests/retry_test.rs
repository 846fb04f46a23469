//! Integration tests for the retry/backoff executor.
//!
//! These exercise `execute_with_retry` directly, without a scheduler:
//! - Attempt counting on success and exhaustion
//! - Exponential backoff spacing
//! - Cancellation before the first attempt and during backoff

use async_trait::async_trait;
use parking_lot::Mutex;
use prometheus_task_engine::core::{
    execute_with_retry, AppResult, RetryPolicy, Task, TaskContext, TaskOutcome,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

// ============================================================================
// TEST TASKS
// ============================================================================

/// Fails until `succeed_on` attempts have been made (0 = never succeeds).
struct Flaky {
    succeed_on: u32,
    policy: RetryPolicy,
    calls: AtomicU32,
    started: Mutex<Vec<Instant>>,
}

impl Flaky {
    fn new(succeed_on: u32, policy: RetryPolicy) -> Self {
        Self {
            succeed_on,
            policy,
            calls: AtomicU32::new(0),
            started: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for Flaky {
    async fn execute(&self, ctx: &TaskContext) -> AppResult<()> {
        self.started.lock().push(Instant::now());
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        assert_eq!(ctx.attempt() + 1, call);
        if self.succeed_on != 0 && call >= self.succeed_on {
            Ok(())
        } else {
            anyhow::bail!("attempt {} failed", ctx.attempt())
        }
    }

    fn name(&self) -> &str {
        "flaky"
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }
}

fn ctx() -> (CancellationToken, TaskContext) {
    let token = CancellationToken::new();
    (token.clone(), TaskContext::new(token))
}

// ============================================================================
// ATTEMPT COUNTING
// ============================================================================

#[tokio::test]
async fn test_succeeds_after_two_failures() {
    let task = Flaky::new(3, RetryPolicy::new(3, Duration::from_millis(1)));
    let (_token, ctx) = ctx();

    let outcome = execute_with_retry(&task, &ctx).await;

    assert!(matches!(outcome, TaskOutcome::Succeeded { attempts: 3 }));
    assert_eq!(task.calls(), 3);
}

#[tokio::test]
async fn test_exhausts_retries_with_last_error() {
    let task = Flaky::new(0, RetryPolicy::new(2, Duration::from_millis(1)));
    let (_token, ctx) = ctx();

    let outcome = execute_with_retry(&task, &ctx).await;

    match outcome {
        TaskOutcome::RetriesExhausted { attempts, last_error } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_error.to_string(), "attempt 2 failed");
        }
        other => panic!("unexpected outcome: {other}"),
    }
    assert_eq!(task.calls(), 3);
}

#[tokio::test]
async fn test_no_retries_policy_runs_once() {
    let task = Flaky::new(0, RetryPolicy::none());
    let (_token, ctx) = ctx();

    let outcome = execute_with_retry(&task, &ctx).await;

    assert!(matches!(outcome, TaskOutcome::RetriesExhausted { attempts: 1, .. }));
    assert_eq!(task.calls(), 1);
}

// ============================================================================
// BACKOFF
// ============================================================================

#[tokio::test]
async fn test_backoff_doubles_between_attempts() {
    let base = Duration::from_millis(20);
    let task = Flaky::new(0, RetryPolicy::new(3, base));
    let (_token, ctx) = ctx();

    let outcome = execute_with_retry(&task, &ctx).await;
    assert_eq!(outcome.attempts(), 4);

    let started = task.started.lock().clone();
    assert_eq!(started.len(), 4);
    for (i, pair) in started.windows(2).enumerate() {
        let gap = pair[1] - pair[0];
        let expected = base * 2u32.pow(u32::try_from(i).unwrap());
        assert!(gap >= expected, "gap {i} was {gap:?}, expected at least {expected:?}");
    }
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[tokio::test]
async fn test_cancelled_context_skips_execution() {
    let task = Flaky::new(1, RetryPolicy::default());
    let (token, ctx) = ctx();
    token.cancel();

    let outcome = execute_with_retry(&task, &ctx).await;

    assert!(matches!(outcome, TaskOutcome::Cancelled { attempts: 0 }));
    assert_eq!(task.calls(), 0);
}

#[tokio::test]
async fn test_cancel_during_backoff_returns_promptly() {
    let task = Arc::new(Flaky::new(0, RetryPolicy::new(3, Duration::from_secs(10))));
    let (token, ctx) = ctx();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let start = Instant::now();
    let outcome = execute_with_retry(task.as_ref(), &ctx).await;

    assert!(matches!(outcome, TaskOutcome::Cancelled { attempts: 1 }));
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(task.calls(), 1);
}
