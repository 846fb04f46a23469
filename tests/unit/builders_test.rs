//! Tests for builder modules

use prometheus_task_engine::builders::{build_queue, SchedulerBuilder};
use prometheus_task_engine::config::{QueueOrdering, SchedulerConfig};
use prometheus_task_engine::core::{SchedulerError, SchedulerState};

#[test]
fn test_scheduler_builder_defaults() {
    let scheduler = SchedulerBuilder::new(
        SchedulerConfig::new()
            .with_worker_count(5)
            .with_queue_capacity(50),
    )
    .build()
    .unwrap();

    assert_eq!(scheduler.state(), SchedulerState::Created);
    let stats = scheduler.stats();
    assert_eq!(stats.worker_count, 5);
    assert_eq!(stats.queue_capacity, 50);
    assert_eq!(stats.queued_tasks, 0);
}

#[test]
fn test_scheduler_builder_invalid_config() {
    let result = SchedulerBuilder::new(SchedulerConfig::new().with_queue_capacity(0)).build();
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_build_queue_capacity() {
    for ordering in [QueueOrdering::Fifo, QueueOrdering::Priority] {
        let config = SchedulerConfig::new().with_queue_capacity(3).with_ordering(ordering);
        let queue = build_queue(&config);
        assert_eq!(queue.capacity(), 3);
        assert_eq!(queue.len(), 0);
    }
}
