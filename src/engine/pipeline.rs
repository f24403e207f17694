// Wed Aug 05 2026 - Alex

use crate::backend::module::ModuleCode;
use crate::backend::{BackendError, ExecutionBackend, ExecutionContext};
use crate::engine::core::{DispatchTopology, EngineError};
use crate::engine::queue::TaskQueue;
use crate::engine::result::{Outcome, TaskError};
use crate::engine::sync::CountdownLatch;
use crate::engine::task::Task;
use crate::engine::worker::{process_task, ReadyReport};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

enum StageMessage {
    Task(Task),
    Eos,
}

enum SinkMessage {
    Completed { batch: u16, stage: usize },
    StageExit(usize),
}

/// Staged dispatch topology: a dispatcher stage feeds parallel worker
/// stages over per-stage channels; a sink stage closes the graph.
///
/// Callers enqueue into the same mutex/condvar pending queue the pool
/// uses, but only the dispatcher consumes it, so a single termination
/// marker suffices there. The dispatcher broadcasts end-of-stream to
/// every worker stage, which is what makes shutdown fan-out inherent to
/// this arrangement.
pub struct PipelineTopology {
    pending: Arc<TaskQueue>,
    exit_latch: Arc<CountdownLatch>,
    worker_count: usize,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl PipelineTopology {
    pub fn start(
        worker_count: usize,
        backend: Arc<dyn ExecutionBackend>,
        module: Arc<ModuleCode>,
    ) -> Result<Self, EngineError> {
        let pending = Arc::new(TaskQueue::new());
        let exit_latch = Arc::new(CountdownLatch::new(worker_count));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (sink_tx, sink_rx) = mpsc::channel();

        let mut threads = Vec::with_capacity(worker_count + 2);
        let mut stage_senders = Vec::with_capacity(worker_count);

        for stage in 0..worker_count {
            let (stage_tx, stage_rx) = mpsc::channel();
            stage_senders.push(stage_tx);
            threads.push(spawn_stage_worker(
                stage,
                stage_rx,
                backend.clone(),
                module.clone(),
                sink_tx.clone(),
                exit_latch.clone(),
                ready_tx.clone(),
            ));
        }
        drop(ready_tx);
        drop(sink_tx);

        threads.push(spawn_dispatcher(pending.clone(), stage_senders));
        threads.push(spawn_sink(sink_rx, worker_count));

        let topology = Self {
            pending,
            exit_latch,
            worker_count,
            threads: Mutex::new(threads),
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
            topology.halt();
            return Err(EngineError::ContextInit { worker, source });
        }

        Ok(topology)
    }

    fn halt(&self) {
        // Single consumer on the pending queue: one marker reaches the
        // dispatcher, which broadcasts EOS downstream.
        self.pending.inject_termination(1);
        self.exit_latch.wait();
        for handle in self.threads.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

impl DispatchTopology for PipelineTopology {
    fn dispatch(&self, tasks: Vec<Task>) {
        self.pending.enqueue_batch(tasks);
    }

    fn shutdown(&self) {
        self.halt();
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }
}

impl Drop for PipelineTopology {
    fn drop(&mut self) {
        self.halt();
    }
}

fn spawn_dispatcher(pending: Arc<TaskQueue>, stages: Vec<Sender<StageMessage>>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut next = 0usize;

        loop {
            match pending.dequeue() {
                Some(task) => {
                    next = forward(&stages, next, task);
                }
                None => {
                    log::debug!("dispatcher broadcasting end-of-stream to {} stages", stages.len());
                    for stage in &stages {
                        let _ = stage.send(StageMessage::Eos);
                    }
                    break;
                }
            }
        }
    })
}

/// Round-robin delivery, skipping stages that already exited. If no
/// stage accepts, the task is resolved as failed rather than dropped.
fn forward(stages: &[Sender<StageMessage>], start: usize, task: Task) -> usize {
    let mut task = task;

    for offset in 0..stages.len() {
        let index = (start + offset) % stages.len();
        match stages[index].send(StageMessage::Task(task)) {
            Ok(()) => return (index + 1) % stages.len(),
            Err(mpsc::SendError(returned)) => match returned {
                StageMessage::Task(t) => task = t,
                StageMessage::Eos => return start,
            },
        }
    }

    log::warn!("no worker stage available for operation '{}'", task.operation());
    task.fulfill(Outcome::Failed(TaskError::ExecutionFailure(
        "no worker stage available".to_string(),
    )));
    start
}

fn spawn_stage_worker(
    stage: usize,
    inbox: Receiver<StageMessage>,
    backend: Arc<dyn ExecutionBackend>,
    module: Arc<ModuleCode>,
    sink_tx: Sender<SinkMessage>,
    exit_latch: Arc<CountdownLatch>,
    ready_tx: Sender<ReadyReport>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut context = match ExecutionContext::create(&*backend, &module) {
            Ok(context) => {
                let _ = ready_tx.send(ReadyReport {
                    worker: stage,
                    result: Ok(()),
                });
                context
            }
            Err(error) => {
                log::warn!("stage {} failed to create its context: {}", stage, error);
                let _ = ready_tx.send(ReadyReport {
                    worker: stage,
                    result: Err(error),
                });
                let _ = sink_tx.send(SinkMessage::StageExit(stage));
                exit_latch.count_down();
                return;
            }
        };
        drop(ready_tx);

        while let Ok(message) = inbox.recv() {
            match message {
                StageMessage::Task(task) => {
                    let batch = task.id();
                    process_task(&mut context, task);
                    let _ = sink_tx.send(SinkMessage::Completed { batch, stage });
                }
                StageMessage::Eos => break,
            }
        }

        log::debug!("stage {} exiting after {} invocations", stage, context.invocations());
        drop(context);

        let _ = sink_tx.send(SinkMessage::StageExit(stage));
        exit_latch.count_down();
    })
}

/// The sink performs no useful work: results travel through the task
/// futures. It only closes the topology and accounts for stage exits.
fn spawn_sink(inbox: Receiver<SinkMessage>, worker_count: usize) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut exited = 0usize;

        while exited < worker_count {
            match inbox.recv() {
                Ok(SinkMessage::Completed { batch, stage }) => {
                    log::trace!("sink saw completion of batch {} from stage {}", batch, stage);
                }
                Ok(SinkMessage::StageExit(stage)) => {
                    log::trace!("sink saw stage {} exit", stage);
                    exited += 1;
                }
                Err(_) => break,
            }
        }
    })
}
