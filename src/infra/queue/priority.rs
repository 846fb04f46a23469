//! Bounded priority queue: highest priority first, FIFO within a priority.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::{PushError, QueuedJob, TaskQueue};

/// Wrapper to make `QueuedJob` orderable by priority (highest first) and FIFO within priority.
struct PriorityEntry {
    job: QueuedJob,
    seq: u64,
}

impl PartialEq for PriorityEntry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for PriorityEntry {}

impl PartialOrd for PriorityEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first
        match self.job.priority.rank().cmp(&other.job.priority.rank()) {
            // FIFO within same priority: lower seq wins (reversed for max-heap)
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

struct HeapState {
    heap: BinaryHeap<PriorityEntry>,
    next_seq: u64,
    closed: bool,
}

/// Bounded binary-heap queue guarded by a `parking_lot` mutex.
///
/// Uses Condvars for blocking pop and timed push. No polling.
pub struct PriorityQueue {
    capacity: usize,
    state: Mutex<HeapState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl PriorityQueue {
    /// Create a queue holding at most `capacity` jobs.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(HeapState {
                heap: BinaryHeap::with_capacity(capacity.min(1024)),
                next_seq: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    fn insert(&self, state: &mut HeapState, job: QueuedJob) {
        let seq = state.next_seq;
        state.next_seq += 1;
        // O(log n) insertion
        state.heap.push(PriorityEntry { job, seq });
        self.not_empty.notify_one();
    }
}

impl TaskQueue for PriorityQueue {
    fn try_push(&self, job: QueuedJob) -> Result<(), PushError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PushError::Closed(job));
        }
        if state.heap.len() >= self.capacity {
            return Err(PushError::Full(job));
        }
        self.insert(&mut state, job);
        Ok(())
    }

    fn push_timeout(&self, job: QueuedJob, timeout: Duration) -> Result<(), PushError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(PushError::Closed(job));
            }
            if state.heap.len() < self.capacity {
                self.insert(&mut state, job);
                return Ok(());
            }
            if self.not_full.wait_until(&mut state, deadline).timed_out() {
                if state.closed {
                    return Err(PushError::Closed(job));
                }
                if state.heap.len() < self.capacity {
                    self.insert(&mut state, job);
                    return Ok(());
                }
                return Err(PushError::Full(job));
            }
        }
    }

    fn pop(&self) -> Option<QueuedJob> {
        let mut state = self.state.lock();
        loop {
            if let Some(entry) = state.heap.pop() {
                self.not_full.notify_one();
                return Some(entry.job);
            }
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    fn drain(&self) -> Vec<QueuedJob> {
        let mut state = self.state.lock();
        let mut jobs = Vec::with_capacity(state.heap.len());
        while let Some(entry) = state.heap.pop() {
            jobs.push(entry.job);
        }
        drop(state);
        self.not_full.notify_all();
        jobs
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
