// Mon Aug 03 2026 - Alex

use std::time::SystemTime;
use thiserror::Error;

/// Per-task failure delivered through the result future.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("operation not found: {0}")]
    OperationNotFound(String),
    #[error("operation failed: {0}")]
    ExecutionFailure(String),
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Success(Vec<u8>),
    Failed(TaskError),
}

/// The record a worker produces exactly once per task, stamped at
/// fulfillment time. `id` is the batch id copied from the task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub id: u16,
    pub outcome: Outcome,
    pub completed_at: SystemTime,
}

impl TaskResult {
    pub fn new(id: u16, outcome: Outcome) -> Self {
        Self {
            id,
            outcome,
            completed_at: SystemTime::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    pub fn value(&self) -> Option<&[u8]> {
        match &self.outcome {
            Outcome::Success(value) => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Vec<u8>> {
        match self.outcome {
            Outcome::Success(value) => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&TaskError> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failed(error) => Some(error),
        }
    }
}
