//! Dedicated thread driving delayed, recurring and periodic timers.

use std::future::Future;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::core::SchedulerError;

/// Single-threaded tokio runtime on its own OS thread.
///
/// Timer futures are spawned through a `TaskTracker`. Once `shutdown` is
/// cancelled the thread refuses new timers, runs the shutdown hook, waits for
/// every tracked future to return and exits, so [`TimerRuntime::join`] is a
/// full barrier.
pub struct TimerRuntime {
    handle: tokio::runtime::Handle,
    tracker: TaskTracker,
    /// Set by the timer thread once shutdown is observed; guards `spawn`.
    closed: Arc<Mutex<bool>>,
    thread: Option<JoinHandle<()>>,
}

impl TimerRuntime {
    /// Spawn the timer thread. `on_shutdown` runs on that thread as soon as
    /// `shutdown` is cancelled, whoever cancelled it.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the runtime or the thread cannot be created.
    pub fn start<F>(shutdown: CancellationToken, on_shutdown: F) -> Result<Self, std::io::Error>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        let tracker = TaskTracker::new();
        let closed = Arc::new(Mutex::new(false));

        let thread_tracker = tracker.clone();
        let thread_closed = Arc::clone(&closed);
        let thread = thread::Builder::new()
            .name("sched-timers".into())
            .spawn(move || {
                debug!("Timer thread started");
                runtime.block_on(async move {
                    shutdown.cancelled().await;
                    *thread_closed.lock() = true;
                    on_shutdown();
                    thread_tracker.close();
                    thread_tracker.wait().await;
                });
                debug!("Timer thread exiting");
            })?;

        Ok(Self {
            handle,
            tracker,
            closed,
            thread: Some(thread),
        })
    }

    /// Spawn a timer future. Shutdown waits for it to complete.
    ///
    /// # Errors
    ///
    /// `SchedulerError::ShuttingDown` once the timer thread has observed shutdown.
    pub fn spawn<F>(&self, fut: F) -> Result<(), SchedulerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let closed = self.closed.lock();
        if *closed {
            return Err(SchedulerError::ShuttingDown);
        }
        self.tracker.spawn_on(fut, &self.handle);
        Ok(())
    }

    /// Whether the timer thread has observed shutdown.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    /// Number of timer futures still running.
    #[must_use]
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Block until the timer thread has exited.
    ///
    /// Only returns after the shutdown token passed to [`TimerRuntime::start`]
    /// has been cancelled and every timer has finished.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Timer thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_spawned_timer_runs_and_join_waits() {
        let shutdown = CancellationToken::new();
        let timers = TimerRuntime::start(shutdown.clone(), || {}).unwrap();

        let (tx, rx) = mpsc::channel();
        timers
            .spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                tx.send(42).unwrap();
            })
            .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 42);

        let stop = shutdown.clone();
        timers
            .spawn(async move {
                stop.cancelled().await;
            })
            .unwrap();
        shutdown.cancel();
        timers.join();
    }

    #[test]
    fn test_spawn_refused_after_shutdown_observed() {
        let shutdown = CancellationToken::new();
        let hook_ran = Arc::new(AtomicBool::new(false));
        let hook = Arc::clone(&hook_ran);
        let timers = TimerRuntime::start(shutdown.clone(), move || {
            hook.store(true, Ordering::SeqCst);
        })
        .unwrap();

        shutdown.cancel();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !timers.is_closed() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(timers.is_closed());
        assert!(matches!(
            timers.spawn(async {}),
            Err(SchedulerError::ShuttingDown)
        ));
        timers.join();
        assert!(hook_ran.load(Ordering::SeqCst));
    }
}
