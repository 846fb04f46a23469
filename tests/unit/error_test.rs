//! Tests for error types

use prometheus_task_engine::core::{SchedulerError, SchedulerState};
use std::time::Duration;

#[test]
fn test_queue_full_error() {
    let err = SchedulerError::QueueFull {
        task: "ticker_tBTCUSD".to_string(),
        capacity: 50,
    };
    assert_eq!(
        format!("{}", err),
        "queue full: task `ticker_tBTCUSD` rejected (capacity 50)"
    );
    assert!(err.is_rejection());
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("worker_count must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: worker_count must be greater than 0"
    );
    assert!(!err.is_rejection());
}

#[test]
fn test_invalid_transition_error() {
    let err = SchedulerError::InvalidTransition {
        from: SchedulerState::Stopped,
        to: SchedulerState::Running,
    };
    assert_eq!(format!("{}", err), "invalid lifecycle transition: stopped -> running");
}

#[test]
fn test_not_running_error() {
    let err = SchedulerError::NotRunning(SchedulerState::Created);
    assert_eq!(format!("{}", err), "scheduler is not running (state: created)");
}

#[test]
fn test_shutting_down_error() {
    assert_eq!(format!("{}", SchedulerError::ShuttingDown), "scheduler is shutting down");
}

#[test]
fn test_invalid_interval_error() {
    let err = SchedulerError::InvalidInterval(Duration::ZERO);
    assert_eq!(format!("{}", err), "invalid interval: 0ns");
}

#[test]
fn test_internal_error() {
    let err = SchedulerError::Internal("timer thread: out of memory".to_string());
    assert_eq!(format!("{}", err), "internal error: timer thread: out of memory");
}

#[test]
fn test_error_converts_into_anyhow() {
    let err: anyhow::Error = SchedulerError::PeriodicNotFound("book".to_string()).into();
    assert_eq!(err.to_string(), "periodic task not found: book");
    assert!(err.downcast_ref::<SchedulerError>().is_some());
}
