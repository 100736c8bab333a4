//! Execution engine: the dependency-ordered scheduler.
//!
//! Drives the task executor over the resolved order, strictly one task in
//! flight (the agent process and the git working tree are shared mutable
//! resources). Every transition is persisted through the transition sink
//! before its event is observable; a persistence failure halts the run.

use std::collections::HashSet;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::{ExecutionEvent, Phase, RunSummary, TaskStatus};
use crate::domain::{EngineError, EngineResult};
use crate::store::SessionStore;

use super::cancel::CancelToken;
use super::executor::TaskExecutor;
use super::resolver::DependencyResolver;
use super::sink::TransitionSink;

pub struct ExecutionEngine {
    store: SessionStore,
    executor: TaskExecutor,
    resolver: DependencyResolver,
    cancel: CancelToken,
}

impl ExecutionEngine {
    pub fn new(store: SessionStore, executor: TaskExecutor) -> Self {
        Self {
            store,
            executor,
            resolver: DependencyResolver::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Token that cancels the run at the next safe checkpoint.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the execution phase to completion without an event subscriber.
    pub async fn run(&self) -> EngineResult<RunSummary> {
        self.run_inner(None).await
    }

    /// Run the execution phase, streaming events to `events`.
    pub async fn run_with_events(
        &self,
        events: mpsc::Sender<ExecutionEvent>,
    ) -> EngineResult<RunSummary> {
        self.run_inner(Some(events)).await
    }

    #[instrument(skip(self, events))]
    async fn run_inner(
        &self,
        events: Option<mpsc::Sender<ExecutionEvent>>,
    ) -> EngineResult<RunSummary> {
        let started = Instant::now();
        let mut state = self.store.load().await?;

        if state.phase != Phase::Execution {
            return Err(EngineError::Configuration(format!(
                "session is in the {} phase; advance to execution first",
                state.phase
            )));
        }

        // Configuration errors (unknown deps, cycles) abort before any task
        let resolution = self.resolver.resolve(&state)?;
        info!(
            runnable = resolution.runnable.len(),
            blocked = resolution.blocked.len(),
            "Execution phase starting"
        );

        let mut sink = TransitionSink::new(&self.store, &mut state, events);
        sink.emit(ExecutionEvent::RunStarted {
            total_tasks: resolution.runnable.len(),
        })
        .await;

        let mut blocked: HashSet<Uuid> = resolution.blocked.iter().copied().collect();
        let mut stalled = false;

        for (index, &task_id) in resolution.runnable.iter().enumerate() {
            if self.cancel.is_cancelled() {
                // Tasks not yet started stay pending; the session resumes
                info!("Run cancelled; remaining tasks stay pending");
                break;
            }

            let (terminal, deps_ok) = {
                let task = sink
                    .state()
                    .task(task_id)
                    .ok_or(EngineError::TaskNotFound(task_id))?;
                (task.is_terminal(), sink.state().dependencies_satisfied(task))
            };
            if terminal {
                continue;
            }
            if !deps_ok {
                blocked.insert(task_id);
                continue;
            }

            let status = self.executor.execute(&mut sink, task_id, &self.cancel).await?;

            if status == TaskStatus::Failed {
                // Stalled-plan check: if nothing left can run, end early
                let remaining: Vec<Uuid> = resolution.runnable[index + 1..]
                    .iter()
                    .filter(|id| {
                        sink.state()
                            .task(**id)
                            .is_some_and(|t| !t.is_terminal())
                    })
                    .copied()
                    .collect();
                if !remaining.is_empty() {
                    let recheck = self.resolver.resolve(sink.state())?;
                    if recheck.runnable.is_empty() {
                        warn!(blocked = remaining.len(), "Plan stalled: failure blocks all remaining tasks");
                        blocked.extend(remaining);
                        stalled = true;
                        break;
                    }
                }
            }
        }

        let summary = RunSummary {
            total_tasks: sink.state().tasks.len(),
            done: sink.state().count_status(TaskStatus::Done),
            failed: sink.state().count_status(TaskStatus::Failed),
            skipped: sink.state().count_status(TaskStatus::Skipped),
            cancelled: sink.state().count_status(TaskStatus::Cancelled),
            blocked: blocked.len(),
            stalled,
            duration_secs: started.elapsed().as_secs(),
        };
        sink.emit(ExecutionEvent::RunCompleted {
            summary: summary.clone(),
        })
        .await;
        info!(
            done = summary.done,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            blocked = summary.blocked,
            stalled = summary.stalled,
            "Execution phase finished"
        );
        Ok(summary)
    }
}
