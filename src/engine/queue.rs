// Mon Aug 03 2026 - Alex

use crate::engine::task::Task;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// Thread-safe FIFO shared by all workers of a pool. Entries are
/// `Option<Task>`; `None` is a termination marker. FIFO order holds
/// across everything ever enqueued, markers included.
///
/// A marker is consumed by exactly one worker, so shutting down an
/// N-consumer pool requires N markers (`inject_termination(n)`). A
/// single marker is only enough for a single consumer, e.g. the
/// pipeline dispatcher stage.
pub struct TaskQueue {
    entries: Mutex<VecDeque<Option<Task>>>,
    available: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Appends a whole batch atomically, in order, and wakes every
    /// blocked consumer.
    pub fn enqueue_batch(&self, tasks: Vec<Task>) {
        let mut entries = self.entries.lock();
        for task in tasks {
            entries.push_back(Some(task));
        }
        drop(entries);
        self.available.notify_all();
    }

    /// Appends `count` termination markers and wakes every blocked
    /// consumer.
    pub fn inject_termination(&self, count: usize) {
        let mut entries = self.entries.lock();
        for _ in 0..count {
            entries.push_back(None);
        }
        drop(entries);
        self.available.notify_all();
    }

    /// Blocks until an entry is available, then removes and returns the
    /// head. `None` tells the caller to terminate.
    pub fn dequeue(&self) -> Option<Task> {
        let mut entries = self.entries.lock();
        loop {
            if let Some(entry) = entries.pop_front() {
                return entry;
            }
            self.available.wait(&mut entries);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
