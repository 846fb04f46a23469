//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Queue ordering selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOrdering {
    /// Admission order; priority is advisory metadata.
    #[default]
    Fifo,
    /// Highest priority first, admission order within a priority.
    Priority,
}

impl std::str::FromStr for QueueOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "priority" => Ok(Self::Priority),
            other => Err(format!("unknown queue ordering `{other}`")),
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Maximum queued tasks before rejection.
    pub queue_capacity: usize,
    /// Queue ordering.
    pub ordering: QueueOrdering,
    /// Stack size for worker threads, in bytes.
    pub thread_stack_size: usize,
    /// How often a periodic dispatcher re-checks a handle whose previous
    /// invocation has not started yet, in milliseconds.
    pub periodic_poll_ms: u64,
    /// Outcome reports buffered for `Scheduler::reports` before new ones are
    /// dropped and counted in `SchedulerStats::dropped_reports`.
    pub report_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            queue_capacity: 50,
            ordering: QueueOrdering::Fifo,
            thread_stack_size: 2 * 1024 * 1024,
            periodic_poll_ms: 100,
            report_capacity: 1024,
        }
    }
}

impl SchedulerConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Set the queue ordering.
    #[must_use]
    pub const fn with_ordering(mut self, ordering: QueueOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Set the periodic re-check interval in milliseconds.
    #[must_use]
    pub const fn with_periodic_poll_ms(mut self, periodic_poll_ms: u64) -> Self {
        self.periodic_poll_ms = periodic_poll_ms;
        self
    }

    /// Set the report channel capacity.
    #[must_use]
    pub const fn with_report_capacity(mut self, report_capacity: usize) -> Self {
        self.report_capacity = report_capacity;
        self
    }

    /// Periodic re-check interval as a `Duration`.
    #[must_use]
    pub const fn periodic_poll(&self) -> Duration {
        Duration::from_millis(self.periodic_poll_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".into());
        }
        if self.thread_stack_size == 0 {
            return Err("thread_stack_size must be greater than 0".into());
        }
        if self.periodic_poll_ms == 0 {
            return Err("periodic_poll_ms must be greater than 0".into());
        }
        if self.report_capacity == 0 {
            return Err("report_capacity must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error description.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `SCHEDULER_*` environment variables, loading a
    /// `.env` file first if one exists. Unset variables keep their defaults.
    ///
    /// Recognized: `SCHEDULER_WORKER_COUNT`, `SCHEDULER_QUEUE_CAPACITY`,
    /// `SCHEDULER_QUEUE_ORDERING`, `SCHEDULER_THREAD_STACK_SIZE`,
    /// `SCHEDULER_PERIODIC_POLL_MS`, `SCHEDULER_REPORT_CAPACITY`.
    ///
    /// # Errors
    ///
    /// Returns a description of the first unparsable or invalid value.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, String>
        where
            T::Err: std::fmt::Display,
        {
            raw.trim()
                .parse()
                .map_err(|e| format!("{key}: invalid value `{raw}`: {e}"))
        }

        let mut cfg = Self::default();
        if let Some(v) = lookup("SCHEDULER_WORKER_COUNT") {
            cfg.worker_count = parse("SCHEDULER_WORKER_COUNT", &v)?;
        }
        if let Some(v) = lookup("SCHEDULER_QUEUE_CAPACITY") {
            cfg.queue_capacity = parse("SCHEDULER_QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("SCHEDULER_QUEUE_ORDERING") {
            cfg.ordering = parse("SCHEDULER_QUEUE_ORDERING", &v)?;
        }
        if let Some(v) = lookup("SCHEDULER_THREAD_STACK_SIZE") {
            cfg.thread_stack_size = parse("SCHEDULER_THREAD_STACK_SIZE", &v)?;
        }
        if let Some(v) = lookup("SCHEDULER_PERIODIC_POLL_MS") {
            cfg.periodic_poll_ms = parse("SCHEDULER_PERIODIC_POLL_MS", &v)?;
        }
        if let Some(v) = lookup("SCHEDULER_REPORT_CAPACITY") {
            cfg.report_capacity = parse("SCHEDULER_REPORT_CAPACITY", &v)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
