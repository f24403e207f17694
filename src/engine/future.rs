// Mon Aug 03 2026 - Alex

use crate::engine::result::TaskResult;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

struct SharedCell {
    result: Mutex<Option<TaskResult>>,
    ready: Condvar,
}

/// Write end of a task's result cell. Consumed by `fulfill`, so a slot
/// can resolve its future at most once.
pub struct ResultSlot {
    cell: Arc<SharedCell>,
}

/// Read end of a task's result cell. Cloneable; every holder may block
/// on or poll the same result.
#[derive(Clone)]
pub struct ResultFuture {
    cell: Arc<SharedCell>,
}

impl ResultSlot {
    pub fn new() -> (ResultSlot, ResultFuture) {
        let cell = Arc::new(SharedCell {
            result: Mutex::new(None),
            ready: Condvar::new(),
        });

        (
            ResultSlot { cell: cell.clone() },
            ResultFuture { cell },
        )
    }

    pub fn fulfill(self, result: TaskResult) {
        let mut slot = self.cell.result.lock();
        debug_assert!(slot.is_none(), "result slot fulfilled twice");
        *slot = Some(result);
        self.cell.ready.notify_all();
    }
}

impl ResultFuture {
    /// Blocks the calling thread until the slot is fulfilled. No timeout,
    /// no cancellation.
    pub fn wait(&self) -> TaskResult {
        let mut slot = self.cell.result.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            self.cell.ready.wait(&mut slot);
        }
    }

    pub fn try_get(&self) -> Option<TaskResult> {
        self.cell.result.lock().clone()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.cell.result.lock().is_some()
    }
}
