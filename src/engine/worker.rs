// Wed Aug 05 2026 - Alex

use crate::backend::module::ModuleCode;
use crate::backend::{BackendError, ExecutionBackend, ExecutionContext};
use crate::engine::core::{DispatchTopology, EngineError};
use crate::engine::queue::TaskQueue;
use crate::engine::result::{Outcome, TaskError};
use crate::engine::sync::CountdownLatch;
use crate::engine::task::Task;
use parking_lot::{Mutex, RwLock};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Ready,
    Processing,
    ShuttingDown,
    Terminated,
}

pub(crate) struct ReadyReport {
    pub worker: usize,
    pub result: Result<(), BackendError>,
}

pub struct Worker {
    id: usize,
    state: Arc<RwLock<WorkerState>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(
        id: usize,
        queue: Arc<TaskQueue>,
        backend: Arc<dyn ExecutionBackend>,
        module: Arc<ModuleCode>,
        exit_latch: Arc<CountdownLatch>,
        ready_tx: Sender<ReadyReport>,
    ) -> Self {
        let state = Arc::new(RwLock::new(WorkerState::Starting));
        let state_handle = state.clone();

        let handle = thread::spawn(move || {
            Worker::run(id, queue, backend, module, exit_latch, ready_tx, state_handle);
        });

        Self {
            id,
            state,
            handle: Some(handle),
        }
    }

    fn run(
        id: usize,
        queue: Arc<TaskQueue>,
        backend: Arc<dyn ExecutionBackend>,
        module: Arc<ModuleCode>,
        exit_latch: Arc<CountdownLatch>,
        ready_tx: Sender<ReadyReport>,
        state: Arc<RwLock<WorkerState>>,
    ) {
        // The context lives and dies on this thread.
        let mut context = match ExecutionContext::create(&*backend, &module) {
            Ok(context) => {
                log::debug!("worker {} loaded module '{}'", id, module.name);
                let _ = ready_tx.send(ReadyReport {
                    worker: id,
                    result: Ok(()),
                });
                context
            }
            Err(error) => {
                log::warn!("worker {} failed to create its context: {}", id, error);
                *state.write() = WorkerState::Terminated;
                let _ = ready_tx.send(ReadyReport {
                    worker: id,
                    result: Err(error),
                });
                exit_latch.count_down();
                return;
            }
        };
        drop(ready_tx);

        loop {
            *state.write() = WorkerState::Ready;
            match queue.dequeue() {
                Some(task) => {
                    *state.write() = WorkerState::Processing;
                    process_task(&mut context, task);
                }
                None => break,
            }
        }

        *state.write() = WorkerState::ShuttingDown;
        log::debug!(
            "worker {} shutting down after {} invocations",
            id,
            context.invocations()
        );
        drop(context);

        *state.write() = WorkerState::Terminated;
        exit_latch.count_down();
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Runs one task to completion. Every path resolves the task's slot;
/// an abandoned slot would block its waiters forever.
pub(crate) fn process_task(context: &mut ExecutionContext, task: Task) {
    let operation = task.operation().to_string();

    let outcome = match context.invoke(&operation, task.payload()) {
        Ok(value) => Outcome::Success(value),
        Err(BackendError::MissingOperation(name)) => {
            log::warn!("operation '{}' not found in module '{}'", name, context.module_name());
            Outcome::Failed(TaskError::OperationNotFound(name))
        }
        Err(error) => {
            log::warn!("operation '{}' failed: {}", operation, error);
            Outcome::Failed(TaskError::ExecutionFailure(error.to_string()))
        }
    };

    task.fulfill(outcome);
}

/// Shared-queue dispatch topology: N workers competing on one FIFO.
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    workers: Mutex<Vec<Worker>>,
    exit_latch: Arc<CountdownLatch>,
    worker_count: usize,
}

impl WorkerPool {
    pub fn start(
        worker_count: usize,
        backend: Arc<dyn ExecutionBackend>,
        module: Arc<ModuleCode>,
    ) -> Result<Self, EngineError> {
        let queue = Arc::new(TaskQueue::new());
        let exit_latch = Arc::new(CountdownLatch::new(worker_count));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let workers: Vec<Worker> = (0..worker_count)
            .map(|id| {
                Worker::spawn(
                    id,
                    queue.clone(),
                    backend.clone(),
                    module.clone(),
                    exit_latch.clone(),
                    ready_tx.clone(),
                )
            })
            .collect();
        drop(ready_tx);

        let pool = Self {
            queue,
            workers: Mutex::new(workers),
            exit_latch,
            worker_count,
        };

        let mut failure: Option<(usize, BackendError)> = None;
        for _ in 0..worker_count {
            match ready_rx.recv() {
                Ok(report) => {
                    if let Err(error) = report.result {
                        failure.get_or_insert((report.worker, error));
                    }
                }
                Err(_) => break,
            }
        }

        if let Some((worker, source)) = failure {
            pool.halt();
            return Err(EngineError::ContextInit { worker, source });
        }

        Ok(pool)
    }

    /// Termination fan-out: one marker per worker, then wait for every
    /// worker to signal the exit latch. One marker would release a
    /// single worker and leave the rest blocked.
    fn halt(&self) {
        self.queue.inject_termination(self.worker_count);
        self.exit_latch.wait();
        for worker in self.workers.lock().iter_mut() {
            worker.join();
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.workers.lock().iter().map(Worker::state).collect()
    }
}

impl DispatchTopology for WorkerPool {
    fn dispatch(&self, tasks: Vec<Task>) {
        self.queue.enqueue_batch(tasks);
    }

    fn shutdown(&self) {
        self.halt();
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.halt();
    }
}
