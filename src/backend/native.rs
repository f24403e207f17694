// Mon Aug 03 2026 - Alex

use crate::backend::builtins::{self, NativeOp, OpState};
use crate::backend::{BackendError, ExecutionBackend, OperationTable};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Single process-wide gate for runtime bring-up/teardown.
static RUNTIME_UP: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(false));

/// The default execution backend: a native function table compiled from
/// line-oriented module source. Each line exposes a builtin, either
/// under its own name (`upper`) or under an alias (`shout = upper`);
/// blank lines and `#` comments are skipped.
pub struct NativeBackend {
    contexts_created: AtomicUsize,
    contexts_live: Arc<AtomicUsize>,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self {
            contexts_created: AtomicUsize::new(0),
            contexts_live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Tables loaded over this backend's lifetime.
    pub fn contexts_created(&self) -> usize {
        self.contexts_created.load(Ordering::SeqCst)
    }

    /// Tables loaded and not yet dropped.
    pub fn contexts_live(&self) -> usize {
        self.contexts_live.load(Ordering::SeqCst)
    }

    fn compile(source: &str) -> Result<IndexMap<String, NativeOp>, BackendError> {
        let mut ops = IndexMap::new();

        for (index, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (name, builtin) = match line.split_once('=') {
                Some((alias, builtin)) => (alias.trim(), builtin.trim()),
                None => (line, line),
            };

            let op = builtins::lookup(builtin).ok_or_else(|| {
                BackendError::Compile(format!("line {}: unknown builtin '{}'", index + 1, builtin))
            })?;

            ops.insert(name.to_string(), op);
        }

        if ops.is_empty() {
            return Err(BackendError::Compile("module defines no operations".to_string()));
        }

        Ok(ops)
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionBackend for NativeBackend {
    fn bootstrap(&self) -> Result<(), BackendError> {
        let mut up = RUNTIME_UP.lock();
        if *up {
            log::debug!("runtime already up, bootstrap skipped");
        } else {
            *up = true;
            log::debug!("runtime bootstrapped");
        }
        Ok(())
    }

    fn teardown(&self) -> Result<(), BackendError> {
        let mut up = RUNTIME_UP.lock();
        *up = false;
        log::debug!("runtime torn down");
        Ok(())
    }

    fn load(&self, module_name: &str, source: &str) -> Result<Box<dyn OperationTable>, BackendError> {
        let ops = Self::compile(source)?;
        log::debug!("module '{}' loaded with {} operations", module_name, ops.len());

        self.contexts_created.fetch_add(1, Ordering::SeqCst);
        self.contexts_live.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(NativeTable {
            ops,
            calls: 0,
            _live: LiveGuard {
                counter: self.contexts_live.clone(),
            },
        }))
    }
}

#[derive(Debug)]
struct LiveGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct NativeTable {
    ops: IndexMap<String, NativeOp>,
    calls: u64,
    _live: LiveGuard,
}

impl OperationTable for NativeTable {
    fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    fn operations(&self) -> Vec<String> {
        self.ops.keys().cloned().collect()
    }

    fn invoke(&mut self, name: &str, payload: &[u8]) -> Result<Vec<u8>, BackendError> {
        let op = *self
            .ops
            .get(name)
            .ok_or_else(|| BackendError::MissingOperation(name.to_string()))?;

        self.calls += 1;
        let state = OpState {
            invocations: self.calls,
        };

        op(&state, payload).map_err(BackendError::Execution)
    }
}
