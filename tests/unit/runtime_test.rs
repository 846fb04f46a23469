//! Tests for the timer runtime

use prometheus_task_engine::runtime::TimerRuntime;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[test]
fn test_timer_runtime_join_waits_for_timers() {
    let shutdown = CancellationToken::new();
    let timers = TimerRuntime::start(shutdown.clone(), || {}).unwrap();

    let (tx, rx) = std::sync::mpsc::channel();
    let stop = shutdown.clone();
    timers
        .spawn(async move {
            stop.cancelled().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send("drained").unwrap();
        })
        .unwrap();
    assert_eq!(timers.active(), 1);

    shutdown.cancel();
    timers.join();
    assert_eq!(rx.try_recv().unwrap(), "drained");
}
