//! Retry/backoff loop wrapped around every task execution.

use tracing::{debug, warn};

use super::{Task, TaskContext, TaskOutcome};

/// Run `task` under its retry policy.
///
/// A cancelled context short-circuits before the first attempt and aborts any
/// backoff sleep in progress; both yield [`TaskOutcome::Cancelled`]. Failures
/// are retried after `backoff_base * 2^attempt` until `max_retries` is used up,
/// at which point the last error is returned in
/// [`TaskOutcome::RetriesExhausted`].
pub async fn execute_with_retry(task: &dyn Task, ctx: &TaskContext) -> TaskOutcome {
    let policy = task.retry_policy();
    let mut attempt: u32 = 0;

    loop {
        if ctx.is_cancelled() {
            debug!(task = task.name(), attempt, "Context cancelled before attempt");
            return TaskOutcome::Cancelled { attempts: attempt };
        }

        let attempts = attempt + 1;
        let error = match task.execute(&ctx.for_attempt(attempt)).await {
            Ok(()) => {
                debug!(task = task.name(), attempts, "Task succeeded");
                return TaskOutcome::Succeeded { attempts };
            }
            Err(e) => e,
        };

        if attempt >= policy.max_retries {
            warn!(
                task = task.name(),
                attempts,
                error = %error,
                "Task failed, retries exhausted"
            );
            return TaskOutcome::RetriesExhausted {
                attempts,
                last_error: error,
            };
        }

        let delay = policy.backoff_for(attempt);
        debug!(
            task = task.name(),
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Task failed, backing off"
        );

        tokio::select! {
            () = ctx.cancelled() => {
                debug!(task = task.name(), attempts, "Backoff aborted by cancellation");
                return TaskOutcome::Cancelled { attempts };
            }
            () = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}
