// Mon Aug 03 2026 - Alex

use crate::engine::future::{ResultFuture, ResultSlot};
use crate::engine::result::{Outcome, TaskResult};
use bytes::Bytes;

/// Unit of work binding a batch id, a shared payload, and an operation
/// name to a single-assignment result slot.
///
/// `id` identifies the batch the task belongs to, not the task itself:
/// every task created by one dispatch call carries the same id, and the
/// counter wraps at `u16::MAX`. Callers correlate individual results by
/// position in the operation list.
pub struct Task {
    id: u16,
    payload: Bytes,
    operation: String,
    slot: ResultSlot,
}

impl Task {
    pub fn new(id: u16, payload: Bytes, operation: String) -> (Task, ResultFuture) {
        let (slot, future) = ResultSlot::new();

        let task = Task {
            id,
            payload,
            operation,
            slot,
        };

        (task, future)
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Resolves the task's future, consuming the task. Workers call this
    /// on every path, success or failure; an unresolved slot would block
    /// its waiters forever.
    pub fn fulfill(self, outcome: Outcome) {
        self.slot.fulfill(TaskResult::new(self.id, outcome));
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::result::TaskError;

    #[test]
    fn test_task_carries_batch_id_and_operation() {
        let (task, _future) = Task::new(12, Bytes::from_static(b"data"), "upper".to_string());
        assert_eq!(task.id(), 12);
        assert_eq!(task.operation(), "upper");
        assert_eq!(task.payload(), b"data");
    }

    #[test]
    fn test_fulfill_resolves_future_with_batch_id() {
        let (task, future) = Task::new(3, Bytes::from_static(b"x"), "double".to_string());
        task.fulfill(Outcome::Success(b"xx".to_vec()));

        let result = future.wait();
        assert_eq!(result.id, 3);
        assert_eq!(result.value(), Some(b"xx".as_slice()));
    }

    #[test]
    fn test_fulfill_with_failure_still_resolves() {
        let (task, future) = Task::new(0, Bytes::new(), "nope".to_string());
        task.fulfill(Outcome::Failed(TaskError::OperationNotFound("nope".to_string())));

        let result = future.wait();
        assert!(result.is_failed());
    }

    #[test]
    fn test_payload_is_shared_not_copied() {
        let payload = Bytes::from(vec![7u8; 1024]);
        let (a, _fa) = Task::new(0, payload.clone(), "a".to_string());
        let (b, _fb) = Task::new(0, payload.clone(), "b".to_string());
        assert_eq!(a.payload().as_ptr(), payload.as_ptr());
        assert_eq!(b.payload().as_ptr(), payload.as_ptr());
    }
}
