//! Service layer: dependency resolution, per-task execution, scheduling.

pub mod cancel;
pub mod engine;
pub mod executor;
pub mod resolver;
pub mod sink;

pub use cancel::CancelToken;
pub use engine::ExecutionEngine;
pub use executor::TaskExecutor;
pub use resolver::{DependencyResolver, Resolution};
pub use sink::TransitionSink;
