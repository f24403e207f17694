// Mon Aug 03 2026 - Alex

pub mod builtins;
pub mod context;
pub mod module;
pub mod native;

pub use context::ExecutionContext;
pub use module::{ModuleCode, ModuleLocator};
pub use native::NativeBackend;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("module compile failed: {0}")]
    Compile(String),
    #[error("operation not found: {0}")]
    MissingOperation(String),
    #[error("execution failed: {0}")]
    Execution(String),
}

/// Factory for per-worker execution state. Shared across worker threads
/// as `Arc<dyn ExecutionBackend>`; the tables it loads are not.
pub trait ExecutionBackend: Send + Sync {
    /// Process-wide runtime bring-up. Called once by the engine when
    /// configured; must be safe to call again (single gate, no re-init).
    fn bootstrap(&self) -> Result<(), BackendError>;

    /// Process-wide runtime teardown, the counterpart of `bootstrap`.
    fn teardown(&self) -> Result<(), BackendError>;

    /// Compiles module source into a loaded operation table. Every
    /// worker calls this independently on its own thread; a failure here
    /// keeps that worker out of the pool.
    fn load(&self, module_name: &str, source: &str) -> Result<Box<dyn OperationTable>, BackendError>;
}

/// A loaded module: named operations over byte payloads. Deliberately
/// not `Send`; a table never leaves the thread that loaded it.
pub trait OperationTable: std::fmt::Debug {
    fn contains(&self, name: &str) -> bool;

    fn operations(&self) -> Vec<String>;

    fn invoke(&mut self, name: &str, payload: &[u8]) -> Result<Vec<u8>, BackendError>;
}
