//! # Prometheus Task Engine
//!
//! A bounded worker pool with one-shot, delayed, recurring and periodic
//! scheduling, wrapped around a retry/backoff executor.
//!
//! Producers (request handlers, timers, periodic dispatchers) enqueue tasks into
//! a single bounded queue. A fixed number of worker threads drain it. When the
//! queue is full, new work is rejected immediately instead of blocking the
//! producer. Every execution runs under its task's retry policy and honors
//! cancellation through a [`TaskContext`](core::TaskContext).
//!
//! ## Key Features
//!
//! - **Bounded admission**: `submit_task` never blocks; a full queue is a `QueueFull` rejection
//! - **Dedicated workers**: each worker is an OS thread with its own single-threaded tokio runtime
//! - **Retry with exponential backoff**: `backoff_base * 2^attempt`, aborted by cancellation
//! - **Timers**: delayed and recurring submissions driven by a dedicated timer thread
//! - **Periodic tasks**: named registrations, rescheduled from the start of the last run
//! - **Graceful stop**: threads are joined after the shutdown broadcast and
//!   queued work is reported as cancelled
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use prometheus_task_engine::config::SchedulerConfig;
//! use prometheus_task_engine::core::{FnTask, RetryPolicy, Scheduler};
//! use prometheus_task_engine::util::Priority;
//!
//! let scheduler = Scheduler::new(
//!     SchedulerConfig::new().with_worker_count(5).with_queue_capacity(50),
//! )?;
//! scheduler.start()?;
//!
//! let task = FnTask::new("ticker_tBTCUSD", |ctx| async move {
//!     tracing::info!(attempt = ctx.attempt(), "fetching ticker");
//!     Ok(())
//! })
//! .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(500)));
//! scheduler.submit_task(Arc::new(task))?;
//!
//! scheduler.register_periodic(
//!     "FundingBook_fUSD",
//!     Duration::from_secs(60),
//!     |_ctx| async { Ok(()) },
//!     Priority::High,
//! )?;
//!
//! scheduler.stop();
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: tasks, retries, the queue seam and the scheduler.
pub mod core;
/// Configuration models for the scheduler.
pub mod config;
/// Builders to construct the scheduler from configuration.
pub mod builders;
/// Infrastructure adapters for queue backends.
pub mod infra;
/// Runtime adapters for timers.
pub mod runtime;
/// Shared utilities.
pub mod util;
