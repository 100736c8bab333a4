//! Foreman - resumable coordinator for agent-driven development sessions.
//!
//! Foreman decomposes a project plan into dependent tasks, executes each
//! task through an external code-generation agent, verifies results via the
//! project's tests, and commits each task on its own branch. Session state
//! persists to a single JSON document so a run resumes after a crash or
//! interruption.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, ports and errors
//! - **Service Layer** (`services`): dependency resolver, per-task
//!   executor and the execution engine
//! - **Store** (`store`): the sole persistence boundary
//! - **Infrastructure Layer** (`infrastructure`): agent invokers,
//!   verification runner, git driver, configuration
//! - **CLI Layer** (`cli`): command-line interface

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
pub mod store;

// Re-export commonly used types for convenience
pub use domain::models::{
    ConversationEntry, ConversationRole, ExecutionEvent, InvokerKind, Phase, RunSummary,
    SessionState, Settings, Task, TaskStatus, TestOutcome,
};
pub use domain::ports::{AgentInvoker, AgentRequest, VcsDriver, VerificationRunner};
pub use domain::{EngineError, EngineResult};
pub use infrastructure::{ConfigError, ConfigLoader};
pub use services::{CancelToken, DependencyResolver, ExecutionEngine, TaskExecutor};
pub use store::SessionStore;
