// Mon Aug 03 2026 - Alex

pub mod backend;
pub mod config;
pub mod engine;
pub mod utils;

pub use backend::{ExecutionBackend, ExecutionContext, ModuleCode, ModuleLocator, NativeBackend};
pub use config::{EngineConfig, TopologyKind};
pub use engine::core::{Engine, EngineError, EngineState};
pub use engine::future::ResultFuture;
pub use engine::result::{Outcome, TaskError, TaskResult};
