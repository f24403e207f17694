// Mon Aug 03 2026 - Alex

pub mod core;
pub mod future;
pub mod pipeline;
pub mod queue;
pub mod result;
pub mod sync;
pub mod task;
pub mod worker;

pub use self::core::{DispatchTopology, Engine, EngineError, EngineState};
pub use future::{ResultFuture, ResultSlot};
pub use pipeline::PipelineTopology;
pub use queue::TaskQueue;
pub use result::{Outcome, TaskError, TaskResult};
pub use sync::CountdownLatch;
pub use task::Task;
pub use worker::{Worker, WorkerPool, WorkerState};
