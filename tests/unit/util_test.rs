//! Tests for utility functions

use prometheus_task_engine::util::{init_tracing, now_ms, Priority, TaskId};

#[test]
fn test_priority_ordering() {
    assert!(Priority::Critical > Priority::High);
    assert!(Priority::High > Priority::Normal);
    assert!(Priority::Normal > Priority::Low);
    assert_eq!(Priority::default(), Priority::Normal);
}

#[test]
fn test_priority_rank_matches_ordering() {
    let mut all = vec![Priority::High, Priority::Low, Priority::Critical, Priority::Normal];
    all.sort_by_key(|p| p.rank());
    assert_eq!(
        all,
        vec![Priority::Low, Priority::Normal, Priority::High, Priority::Critical]
    );
}

#[test]
fn test_priority_serde() {
    let json = serde_json::to_string(&Priority::Critical).unwrap();
    assert_eq!(json, "\"critical\"");
    let back: Priority = serde_json::from_str("\"low\"").unwrap();
    assert_eq!(back, Priority::Low);
    assert_eq!(Priority::High.to_string(), "high");
}

#[test]
fn test_task_id() {
    let id: TaskId = 12345;
    assert_eq!(id, 12345u64);
}

#[test]
fn test_now_ms_advances() {
    let before = now_ms();
    std::thread::sleep(std::time::Duration::from_millis(2));
    assert!(now_ms() > before);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialized");
}
