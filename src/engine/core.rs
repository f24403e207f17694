// Wed Aug 05 2026 - Alex

use crate::backend::{BackendError, ExecutionBackend};
use crate::config::{EngineConfig, TopologyKind};
use crate::engine::future::ResultFuture;
use crate::engine::pipeline::PipelineTopology;
use crate::engine::task::Task;
use crate::engine::worker::WorkerPool;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use thiserror::Error;

// At most one engine may be Running per process.
static ENGINE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// A dispatch arrangement the engine can run on: the shared-queue pool
/// or the staged pipeline, selected at construction time.
pub trait DispatchTopology: Send + Sync {
    fn dispatch(&self, tasks: Vec<Task>);

    /// Fans termination out to every worker and blocks until all of
    /// them have torn down their contexts and exited.
    fn shutdown(&self);

    fn worker_count(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Running,
    Draining,
    Terminated,
}

enum Lifecycle {
    Uninitialized,
    Running(Box<dyn DispatchTopology>),
    Draining,
    Terminated,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("an engine is already running")]
    AlreadyRunning,
    #[error("engine is not running")]
    NotRunning,
    #[error("worker count must be at least one")]
    NoWorkers,
    #[error("dispatch requires at least one operation name")]
    NoOperations,
    #[error("failed to read module source: {0}")]
    ModuleLoad(#[from] std::io::Error),
    #[error("runtime bootstrap failed: {0}")]
    Bootstrap(BackendError),
    #[error("worker {worker} failed to initialize its execution context: {source}")]
    ContextInit { worker: usize, source: BackendError },
}

/// Lifecycle coordinator: `Uninitialized → Running → Draining →
/// Terminated`, checked and advanced under one lock. Dispatch hands
/// batches to the selected topology; shutdown drains it completely
/// before returning.
pub struct Engine {
    config: EngineConfig,
    backend: Arc<dyn ExecutionBackend>,
    lifecycle: Mutex<Lifecycle>,
    batch_counter: AtomicU16,
}

impl Engine {
    pub fn new(config: EngineConfig, backend: Arc<dyn ExecutionBackend>) -> Self {
        Self {
            config,
            backend,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            batch_counter: AtomicU16::new(0),
        }
    }

    pub fn initialize(&self) -> Result<(), EngineError> {
        let mut lifecycle = self.lifecycle.lock();
        if !matches!(*lifecycle, Lifecycle::Uninitialized) {
            return Err(EngineError::AlreadyRunning);
        }
        if self.config.worker_count == 0 {
            return Err(EngineError::NoWorkers);
        }
        if ENGINE_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::AlreadyRunning);
        }

        match self.start_topology() {
            Ok(topology) => {
                log::info!(
                    "engine running: {} workers, {:?} topology",
                    topology.worker_count(),
                    self.config.topology
                );
                *lifecycle = Lifecycle::Running(topology);
                Ok(())
            }
            Err(error) => {
                ENGINE_ACTIVE.store(false, Ordering::SeqCst);
                Err(error)
            }
        }
    }

    fn start_topology(&self) -> Result<Box<dyn DispatchTopology>, EngineError> {
        let module = Arc::new(self.config.module.read()?);

        if self.config.bootstrap_runtime {
            self.backend.bootstrap().map_err(EngineError::Bootstrap)?;
        }

        let topology: Box<dyn DispatchTopology> = match self.config.topology {
            TopologyKind::SharedQueue => Box::new(WorkerPool::start(
                self.config.worker_count,
                self.backend.clone(),
                module,
            )?),
            TopologyKind::Pipeline => Box::new(PipelineTopology::start(
                self.config.worker_count,
                self.backend.clone(),
                module,
            )?),
        };

        Ok(topology)
    }

    /// Enqueues one task per operation name, all sharing a fresh batch
    /// id, and returns their futures in request order. Never blocks on
    /// the work itself.
    pub fn dispatch(
        &self,
        payload: Bytes,
        operations: &[String],
    ) -> Result<Vec<ResultFuture>, EngineError> {
        if operations.is_empty() {
            return Err(EngineError::NoOperations);
        }

        let lifecycle = self.lifecycle.lock();
        let topology = match &*lifecycle {
            Lifecycle::Running(topology) => topology,
            _ => return Err(EngineError::NotRunning),
        };

        // Wraps at u16::MAX; batches long outliving 65536 dispatch
        // calls must correlate results by position, not id.
        let batch = self.batch_counter.fetch_add(1, Ordering::Relaxed);

        let mut tasks = Vec::with_capacity(operations.len());
        let mut futures = Vec::with_capacity(operations.len());
        for operation in operations {
            let (task, future) = Task::new(batch, payload.clone(), operation.clone());
            tasks.push(task);
            futures.push(future);
        }

        topology.dispatch(tasks);
        Ok(futures)
    }

    /// Blocks until every worker has observed termination, torn down
    /// its context, and exited. Errors immediately when not running, so
    /// a repeated call can never hang.
    pub fn shutdown(&self, teardown_runtime: bool) -> Result<(), EngineError> {
        let mut lifecycle = self.lifecycle.lock();
        let topology = match std::mem::replace(&mut *lifecycle, Lifecycle::Draining) {
            Lifecycle::Running(topology) => topology,
            previous => {
                *lifecycle = previous;
                return Err(EngineError::NotRunning);
            }
        };
        drop(lifecycle);

        log::info!("engine draining {} workers", topology.worker_count());
        topology.shutdown();
        drop(topology);

        if teardown_runtime {
            if let Err(error) = self.backend.teardown() {
                log::warn!("runtime teardown failed: {}", error);
            }
        }

        *self.lifecycle.lock() = Lifecycle::Terminated;
        ENGINE_ACTIVE.store(false, Ordering::SeqCst);
        log::info!("engine terminated");
        Ok(())
    }

    pub fn state(&self) -> EngineState {
        match &*self.lifecycle.lock() {
            Lifecycle::Uninitialized => EngineState::Uninitialized,
            Lifecycle::Running(_) => EngineState::Running,
            Lifecycle::Draining => EngineState::Draining,
            Lifecycle::Terminated => EngineState::Terminated,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Dropping a running engine drains its topology via the
        // topology's own Drop; the process-wide gate must be given back
        // here or no later engine could ever start.
        if matches!(*self.lifecycle.lock(), Lifecycle::Running(_)) {
            ENGINE_ACTIVE.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ModuleLocator, NativeBackend};
    use parking_lot::{Mutex, MutexGuard};
    use std::thread;

    // The process-wide single-instance gate means engine tests cannot
    // overlap; every test in this module serializes on this lock.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock()
    }

    fn config(topology: TopologyKind, workers: usize, source: &str) -> EngineConfig {
        EngineConfig::default()
            .with_module(ModuleLocator::Inline {
                name: "ops".to_string(),
                source: source.to_string(),
            })
            .with_worker_count(workers)
            .with_topology(topology)
    }

    fn ops(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn scenario_a(topology: TopologyKind) {
        let backend = Arc::new(NativeBackend::new());
        let engine = Engine::new(config(topology, 4, "double\nupper"), backend);

        engine.initialize().unwrap();
        assert_eq!(engine.state(), EngineState::Running);

        let futures = engine
            .dispatch(Bytes::from_static(b"x"), &ops(&["double", "upper"]))
            .unwrap();
        assert_eq!(futures.len(), 2);

        let double = futures[0].wait();
        let upper = futures[1].wait();
        assert_eq!(double.value(), Some(b"xx".as_slice()));
        assert_eq!(upper.value(), Some(b"X".as_slice()));
        assert_eq!(double.id, upper.id);

        engine.shutdown(true).unwrap();
        assert_eq!(engine.state(), EngineState::Terminated);
    }

    #[test]
    fn test_scenario_a_shared_queue() {
        let _guard = serial();
        scenario_a(TopologyKind::SharedQueue);
    }

    #[test]
    fn test_scenario_a_pipeline() {
        let _guard = serial();
        scenario_a(TopologyKind::Pipeline);
    }

    #[test]
    fn test_scenario_b_missing_operation_does_not_poison_batch() {
        let _guard = serial();
        let backend = Arc::new(NativeBackend::new());
        let engine = Engine::new(config(TopologyKind::SharedQueue, 2, "double\nupper"), backend);
        engine.initialize().unwrap();

        let futures = engine
            .dispatch(Bytes::from_static(b"abc"), &ops(&["double", "ghost", "upper"]))
            .unwrap();

        assert_eq!(futures[0].wait().value(), Some(b"abcabc".as_slice()));
        assert!(futures[1].wait().is_failed());
        assert_eq!(futures[2].wait().value(), Some(b"ABC".as_slice()));

        engine.shutdown(false).unwrap();
    }

    #[test]
    fn test_scenario_c_second_initialize_fails() {
        let _guard = serial();
        let backend = Arc::new(NativeBackend::new());
        let engine = Engine::new(config(TopologyKind::SharedQueue, 2, "upper"), backend.clone());
        engine.initialize().unwrap();

        assert!(matches!(engine.initialize(), Err(EngineError::AlreadyRunning)));

        // another instance is blocked by the process-wide gate too
        let second = Engine::new(config(TopologyKind::SharedQueue, 2, "upper"), backend.clone());
        assert!(matches!(second.initialize(), Err(EngineError::AlreadyRunning)));

        // the pool is untouched by the failed attempts
        let futures = engine
            .dispatch(Bytes::from_static(b"ok"), &ops(&["upper"]))
            .unwrap();
        assert_eq!(futures[0].wait().value(), Some(b"OK".as_slice()));

        engine.shutdown(false).unwrap();

        // gate released: a fresh engine may run now
        let third = Engine::new(config(TopologyKind::SharedQueue, 1, "upper"), backend);
        third.initialize().unwrap();
        third.shutdown(false).unwrap();
    }

    #[test]
    fn test_dispatch_outside_running_fails_fast() {
        let _guard = serial();
        let backend = Arc::new(NativeBackend::new());
        let engine = Engine::new(config(TopologyKind::SharedQueue, 1, "upper"), backend);

        assert!(matches!(
            engine.dispatch(Bytes::new(), &ops(&["upper"])),
            Err(EngineError::NotRunning)
        ));

        engine.initialize().unwrap();
        engine.shutdown(false).unwrap();

        assert!(matches!(
            engine.dispatch(Bytes::new(), &ops(&["upper"])),
            Err(EngineError::NotRunning)
        ));
    }

    #[test]
    fn test_empty_operation_list_is_rejected() {
        let _guard = serial();
        let backend = Arc::new(NativeBackend::new());
        let engine = Engine::new(config(TopologyKind::SharedQueue, 1, "upper"), backend);
        engine.initialize().unwrap();

        assert!(matches!(
            engine.dispatch(Bytes::from_static(b"x"), &[]),
            Err(EngineError::NoOperations)
        ));

        engine.shutdown(false).unwrap();
    }

    #[test]
    fn test_shutdown_when_not_running_errors_immediately() {
        let _guard = serial();
        let backend = Arc::new(NativeBackend::new());
        let engine = Engine::new(config(TopologyKind::SharedQueue, 1, "upper"), backend);

        assert!(matches!(engine.shutdown(false), Err(EngineError::NotRunning)));

        engine.initialize().unwrap();
        engine.shutdown(false).unwrap();
        assert!(matches!(engine.shutdown(false), Err(EngineError::NotRunning)));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let _guard = serial();
        let backend = Arc::new(NativeBackend::new());
        let engine = Engine::new(config(TopologyKind::SharedQueue, 0, "upper"), backend);
        assert!(matches!(engine.initialize(), Err(EngineError::NoWorkers)));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_module_load_error_releases_gate() {
        let _guard = serial();
        let backend = Arc::new(NativeBackend::new());
        let bad = EngineConfig::default()
            .with_module(ModuleLocator::File("/nonexistent/module.ops".into()))
            .with_worker_count(2);
        let engine = Engine::new(bad, backend.clone());

        assert!(matches!(engine.initialize(), Err(EngineError::ModuleLoad(_))));

        let good = Engine::new(config(TopologyKind::SharedQueue, 1, "upper"), backend);
        good.initialize().unwrap();
        good.shutdown(false).unwrap();
    }

    #[test]
    fn test_context_init_error_releases_gate() {
        let _guard = serial();
        let backend = Arc::new(NativeBackend::new());
        let engine = Engine::new(config(TopologyKind::SharedQueue, 3, "frobnicate"), backend.clone());

        assert!(matches!(
            engine.initialize(),
            Err(EngineError::ContextInit { .. })
        ));
        assert_eq!(backend.contexts_live(), 0);

        let retry = Engine::new(config(TopologyKind::SharedQueue, 1, "upper"), backend);
        retry.initialize().unwrap();
        retry.shutdown(false).unwrap();
    }

    #[test]
    fn test_batch_ids_advance_per_dispatch() {
        let _guard = serial();
        let backend = Arc::new(NativeBackend::new());
        let engine = Engine::new(config(TopologyKind::SharedQueue, 2, "upper"), backend);
        engine.initialize().unwrap();

        let first = engine
            .dispatch(Bytes::from_static(b"a"), &ops(&["upper", "upper"]))
            .unwrap();
        let second = engine
            .dispatch(Bytes::from_static(b"b"), &ops(&["upper"]))
            .unwrap();

        let id_a = first[0].wait().id;
        assert_eq!(first[1].wait().id, id_a);
        assert_eq!(second[0].wait().id, id_a.wrapping_add(1));

        engine.shutdown(false).unwrap();
    }

    #[test]
    fn test_every_future_resolves_exactly_once_per_dispatch() {
        let _guard = serial();
        let backend = Arc::new(NativeBackend::new());
        let engine = Engine::new(
            config(TopologyKind::SharedQueue, 4, "double\nupper\nfail"),
            backend,
        );
        engine.initialize().unwrap();

        let names = ops(&["double", "fail", "ghost", "upper"]);
        let futures = engine.dispatch(Bytes::from_static(b"p"), &names).unwrap();
        assert_eq!(futures.len(), names.len());

        for future in &futures {
            future.wait();
            assert!(future.is_fulfilled());
        }

        engine.shutdown(false).unwrap();
    }

    #[test]
    fn test_concurrent_dispatch_loses_nothing() {
        let _guard = serial();
        let backend = Arc::new(NativeBackend::new());
        let engine = Arc::new(Engine::new(
            config(TopologyKind::SharedQueue, 4, "checksum\nlength"),
            backend,
        ));
        engine.initialize().unwrap();

        let mut callers = Vec::new();
        for caller in 0..4 {
            let engine = engine.clone();
            callers.push(thread::spawn(move || {
                let payload = Bytes::from(format!("payload-{}", caller));
                let mut futures = Vec::new();
                for _ in 0..25 {
                    futures.extend(
                        engine
                            .dispatch(payload.clone(), &ops(&["checksum", "length"]))
                            .unwrap(),
                    );
                }
                futures
            }));
        }

        let mut total = 0;
        for caller in callers {
            for future in caller.join().unwrap() {
                assert!(future.wait().is_success());
                total += 1;
            }
        }
        assert_eq!(total, 4 * 25 * 2);

        engine.shutdown(false).unwrap();
    }

    #[test]
    fn test_shutdown_releases_every_context() {
        let _guard = serial();
        let backend = Arc::new(NativeBackend::new());
        let engine = Engine::new(config(TopologyKind::SharedQueue, 6, "upper"), backend.clone());
        engine.initialize().unwrap();

        let futures = engine
            .dispatch(Bytes::from_static(b"x"), &ops(&["upper", "upper", "upper"]))
            .unwrap();
        for future in futures {
            future.wait();
        }

        engine.shutdown(true).unwrap();
        assert_eq!(backend.contexts_created(), 6);
        assert_eq!(backend.contexts_live(), 0);
    }
}
