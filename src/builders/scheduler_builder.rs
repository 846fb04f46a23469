//! Builder that assembles a [`Scheduler`] from configuration.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{QueueOrdering, SchedulerConfig};
use crate::core::{Scheduler, SchedulerError, TaskQueue};
use crate::infra::queue::{FifoQueue, PriorityQueue};

/// Build the queue backend selected by `cfg.ordering`.
#[must_use]
pub fn build_queue(cfg: &SchedulerConfig) -> Arc<dyn TaskQueue> {
    match cfg.ordering {
        QueueOrdering::Fifo => Arc::new(FifoQueue::new(cfg.queue_capacity)),
        QueueOrdering::Priority => Arc::new(PriorityQueue::new(cfg.queue_capacity)),
    }
}

/// Fluent construction of a [`Scheduler`].
///
/// ```rust,ignore
/// let app = CancellationToken::new();
/// let scheduler = SchedulerBuilder::new(SchedulerConfig::from_env()?)
///     .with_parent_token(&app)
///     .build()?;
/// ```
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    parent: Option<CancellationToken>,
    queue: Option<Arc<dyn TaskQueue>>,
}

impl SchedulerBuilder {
    /// Start from `config`.
    #[must_use]
    pub const fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            parent: None,
            queue: None,
        }
    }

    /// Tie scheduler shutdown to `parent`: cancelling it cancels every task
    /// context and timer, though threads are only joined by `stop`.
    #[must_use]
    pub fn with_parent_token(mut self, parent: &CancellationToken) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Use a custom queue backend instead of the one `ordering` selects.
    /// Its capacity overrides `queue_capacity`.
    #[must_use]
    pub fn with_queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Validate the configuration and build a scheduler in the `Created` state.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if validation fails.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        let mut config = self.config;
        if let Some(queue) = &self.queue {
            config.queue_capacity = queue.capacity();
        }
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let queue = self.queue.unwrap_or_else(|| build_queue(&config));
        let shutdown = self
            .parent
            .map_or_else(CancellationToken::new, |parent| parent.child_token());

        Ok(Scheduler::from_parts(config, queue, shutdown))
    }
}
