//! Core scheduling abstractions: tasks, retries, the queue seam and the scheduler.

pub mod error;
pub mod lifecycle;
pub mod outcome;
pub mod periodic;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod task;
pub mod timers;
pub mod worker_pool;

pub use error::{AppResult, SchedulerError};
pub use lifecycle::SchedulerState;
pub use outcome::{OutcomeKind, TaskOutcome, TaskReport};
pub use periodic::{PeriodicHandle, PeriodicTask};
pub use queue::{PushError, QueuedJob, TaskQueue};
pub use retry::execute_with_retry;
pub use scheduler::Scheduler;
pub use task::{FnTask, RetryPolicy, Task, TaskContext, TaskFuture};
pub use timers::TimerHandle;
pub use worker_pool::SchedulerStats;
