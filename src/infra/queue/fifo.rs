//! FIFO queue on a bounded crossbeam channel.
//!
//! Priority is carried as metadata only; jobs come out in admission order.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;

use crate::core::{PushError, QueuedJob, TaskQueue};

/// Bounded FIFO queue.
///
/// Closing drops the sender, so workers blocked in `pop` wake up once the
/// remaining jobs are handed out.
pub struct FifoQueue {
    capacity: usize,
    /// Option allows clean shutdown by dropping.
    tx: Mutex<Option<Sender<QueuedJob>>>,
    rx: Receiver<QueuedJob>,
}

impl FifoQueue {
    /// Create a queue holding at most `capacity` jobs.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            capacity,
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }
}

impl TaskQueue for FifoQueue {
    fn try_push(&self, job: QueuedJob) -> Result<(), PushError> {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(PushError::Closed(job));
        };
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => Err(PushError::Full(job)),
            Err(TrySendError::Disconnected(job)) => Err(PushError::Closed(job)),
        }
    }

    fn push_timeout(&self, job: QueuedJob, timeout: Duration) -> Result<(), PushError> {
        // Clone out of the lock so a blocked producer does not hold up close().
        let tx = self.tx.lock().clone();
        let Some(tx) = tx else {
            return Err(PushError::Closed(job));
        };
        match tx.send_timeout(job, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(job)) => Err(PushError::Full(job)),
            Err(SendTimeoutError::Disconnected(job)) => Err(PushError::Closed(job)),
        }
    }

    fn pop(&self) -> Option<QueuedJob> {
        self.rx.recv().ok()
    }

    fn drain(&self) -> Vec<QueuedJob> {
        self.rx.try_iter().collect()
    }

    fn close(&self) {
        self.tx.lock().take();
    }

    fn len(&self) -> usize {
        self.rx.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
