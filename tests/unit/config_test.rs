//! Tests for configuration validation

use prometheus_task_engine::config::{QueueOrdering, SchedulerConfig};
use std::time::Duration;

#[test]
fn test_scheduler_config_defaults() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.worker_count > 0);
    assert_eq!(cfg.queue_capacity, 50);
    assert_eq!(cfg.ordering, QueueOrdering::Fifo);
    assert_eq!(cfg.periodic_poll(), Duration::from_millis(100));
    assert_eq!(cfg.report_capacity, 1024);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_scheduler_config_builders() {
    let cfg = SchedulerConfig::new()
        .with_worker_count(5)
        .with_queue_capacity(10)
        .with_ordering(QueueOrdering::Priority)
        .with_thread_stack_size(512 * 1024)
        .with_periodic_poll_ms(25);
    assert_eq!(cfg.worker_count, 5);
    assert_eq!(cfg.queue_capacity, 10);
    assert_eq!(cfg.ordering, QueueOrdering::Priority);
    assert_eq!(cfg.thread_stack_size, 512 * 1024);
    assert_eq!(cfg.periodic_poll(), Duration::from_millis(25));
}

#[test]
fn test_scheduler_config_invalid_worker_count() {
    let invalid = SchedulerConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_queue_capacity() {
    let invalid = SchedulerConfig::new().with_queue_capacity(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_stack_size() {
    let invalid = SchedulerConfig::new().with_thread_stack_size(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_report_capacity() {
    let invalid = SchedulerConfig::new().with_report_capacity(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{"worker_count": 5, "queue_capacity": 50, "ordering": "priority"}"#,
    )
    .unwrap();
    assert_eq!(cfg.worker_count, 5);
    assert_eq!(cfg.queue_capacity, 50);
    assert_eq!(cfg.ordering, QueueOrdering::Priority);
    assert_eq!(cfg.periodic_poll_ms, 100);
}

#[test]
fn test_scheduler_config_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{"queue_capacity": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_queue_ordering_from_str() {
    assert_eq!("FIFO".parse::<QueueOrdering>().unwrap(), QueueOrdering::Fifo);
    assert_eq!(" priority ".parse::<QueueOrdering>().unwrap(), QueueOrdering::Priority);
    assert!("lifo".parse::<QueueOrdering>().is_err());
}
