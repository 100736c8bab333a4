//! Per-task execution state machine.
//!
//! Drives one task through `Branching -> Generating -> Testing ->
//! (Committing | Retrying | Failed)`, forwarding streamed agent output as
//! events and observing cancellation at every checkpoint.
//!
//! Failure attribution: invocation/tool errors (agent unavailable, VCS
//! failure, unlaunchable test command) fail the task immediately without
//! consuming retry budget; verification failures consume one retry each.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::{
    ExecutionEvent, SessionState, Settings, Task, TaskStatus, TestOutcome,
};
use crate::domain::ports::{AgentError, AgentInvoker, AgentOutcome, AgentRequest, VcsDriver, VerificationRunner};
use crate::domain::{EngineError, EngineResult};

use super::cancel::CancelToken;
use super::sink::TransitionSink;

/// Longest failure-output tail embedded in follow-up prompts and errors.
const FAILURE_TAIL_CHARS: usize = 4000;

/// Executes one task at a time against the shared working tree.
pub struct TaskExecutor {
    invoker: Arc<dyn AgentInvoker>,
    verifier: Arc<dyn VerificationRunner>,
    vcs: Arc<dyn VcsDriver>,
    repo_root: PathBuf,
}

impl TaskExecutor {
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        verifier: Arc<dyn VerificationRunner>,
        vcs: Arc<dyn VcsDriver>,
        repo_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            invoker,
            verifier,
            vcs,
            repo_root: repo_root.into(),
        }
    }

    /// Run the state machine for `task_id` to a terminal status.
    ///
    /// The caller has already established that all dependencies are
    /// satisfied. Returns the terminal status; `Err` is reserved for
    /// engine-halting conditions (persistence failure, unknown task).
    #[instrument(skip(self, sink, cancel), fields(task_id = %task_id))]
    pub async fn execute(
        &self,
        sink: &mut TransitionSink<'_>,
        task_id: Uuid,
        cancel: &CancelToken,
    ) -> EngineResult<TaskStatus> {
        let task = sink
            .state()
            .task(task_id)
            .ok_or(EngineError::TaskNotFound(task_id))?
            .clone();
        let settings = sink.state().settings.clone();

        if cancel.is_cancelled() {
            return self.finish_cancelled(sink, task_id).await;
        }

        // Branching: enter in_progress and put the working tree on the
        // task's deterministically named branch.
        let branch = task.branch.clone().unwrap_or_else(|| task.branch_name());
        let started_branch = branch.clone();
        sink.apply(
            move |state| {
                if let Some(t) = state.task_mut(task_id) {
                    if t.status == TaskStatus::Pending {
                        let _ = t.transition_to(TaskStatus::InProgress);
                    }
                    t.branch = Some(started_branch);
                }
            },
            Some(ExecutionEvent::TaskStarted {
                task_id,
                title: task.title.clone(),
            }),
        )
        .await?;

        if let Err(e) = self.vcs.create_or_switch_branch(&branch).await {
            return self.fail_infrastructure(sink, task_id, "vcs", &e.to_string()).await;
        }

        // Generating/Testing loop. `attempt` resumes from the persisted
        // retry count so an interrupted task does not regain budget.
        let mut attempt = task.retry_count;
        let mut followup: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return self.finish_cancelled(sink, task_id).await;
            }

            let request = build_request(&task, sink.state(), followup.as_deref(), &settings);
            let outcome = self.stream_invocation(sink, task_id, request, cancel).await;
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(AgentError::Cancelled) => return self.finish_cancelled(sink, task_id).await,
                Err(e) => {
                    return self
                        .fail_infrastructure(sink, task_id, "agent", &e.to_string())
                        .await
                }
            };

            // The adapter's semantic completion signal, not the exit code.
            if !outcome.success {
                let reason = format!("agent reported failure: {}", tail(&outcome.final_message, FAILURE_TAIL_CHARS));
                if attempt < settings.max_retries {
                    attempt += 1;
                    self.record_retry(sink, task_id, attempt, settings.max_retries, &reason)
                        .await?;
                    followup = Some(format!(
                        "The previous attempt did not complete its work:\n{}\nTry again.",
                        tail(&outcome.final_message, FAILURE_TAIL_CHARS)
                    ));
                    continue;
                }
                return self.fail_verification(sink, task_id, attempt, &reason).await;
            }

            if cancel.is_cancelled() {
                return self.finish_cancelled(sink, task_id).await;
            }

            // Testing
            let test_outcome = match self.verifier.run(&self.repo_root).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    return self
                        .fail_infrastructure(sink, task_id, "verification", &e.to_string())
                        .await
                }
            };
            sink.emit(ExecutionEvent::TaskTestResult {
                task_id,
                outcome: test_outcome.clone(),
            })
            .await;

            match test_outcome {
                TestOutcome::Failed { output } => {
                    let reason = format!("verification failed: {}", tail(&output, FAILURE_TAIL_CHARS));
                    if attempt < settings.max_retries {
                        attempt += 1;
                        self.record_retry(sink, task_id, attempt, settings.max_retries, &reason)
                            .await?;
                        followup = Some(format!(
                            "The previous attempt failed verification. Fix the code so the \
                             project tests pass.\n\nTest output:\n{}",
                            tail(&output, FAILURE_TAIL_CHARS)
                        ));
                        continue;
                    }
                    warn!(task_id = %task_id, retries = attempt, "Retry budget exhausted");
                    return self.fail_verification(sink, task_id, attempt, &reason).await;
                }
                TestOutcome::Passed { .. } | TestOutcome::Skipped { .. } => {
                    if cancel.is_cancelled() {
                        return self.finish_cancelled(sink, task_id).await;
                    }
                    // Committing
                    let message = format!("task: {} (attempt {})", task.title, attempt + 1);
                    let commit = match self.vcs.commit_all(&message).await {
                        Ok(commit) => commit,
                        Err(e) => {
                            return self
                                .fail_infrastructure(sink, task_id, "vcs", &e.to_string())
                                .await
                        }
                    };
                    sink.apply(
                        move |state| {
                            if let Some(t) = state.task_mut(task_id) {
                                if let Some(commit) = commit {
                                    t.commits.push(commit);
                                }
                                t.retry_count = attempt;
                                t.last_error = None;
                                let _ = t.transition_to(TaskStatus::Done);
                            }
                        },
                        Some(ExecutionEvent::TaskCompleted {
                            task_id,
                            status: TaskStatus::Done,
                        }),
                    )
                    .await?;
                    info!(task_id = %task_id, retries = attempt, "Task done");
                    return Ok(TaskStatus::Done);
                }
            }
        }
    }

    /// Run one agent invocation, forwarding streamed chunks as events.
    async fn stream_invocation(
        &self,
        sink: &TransitionSink<'_>,
        task_id: Uuid,
        request: AgentRequest,
        cancel: &CancelToken,
    ) -> Result<AgentOutcome, AgentError> {
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(64);
        let invoke = self.invoker.invoke(request, chunk_tx, cancel.watch());
        tokio::pin!(invoke);

        let mut chunks_open = true;
        let result = loop {
            tokio::select! {
                maybe = chunk_rx.recv(), if chunks_open => match maybe {
                    Some(text) => {
                        sink.emit(ExecutionEvent::AgentOutputChunk { task_id, text }).await;
                    }
                    None => chunks_open = false,
                },
                result = &mut invoke => break result,
            }
        };

        // Drain chunks that were buffered when the invocation finished
        while let Ok(text) = chunk_rx.try_recv() {
            sink.emit(ExecutionEvent::AgentOutputChunk { task_id, text }).await;
        }

        result
    }

    async fn record_retry(
        &self,
        sink: &mut TransitionSink<'_>,
        task_id: Uuid,
        attempt: u32,
        max_attempts: u32,
        reason: &str,
    ) -> EngineResult<()> {
        let recorded = reason.to_string();
        let event_reason = reason.to_string();
        sink.apply(
            move |state| {
                if let Some(t) = state.task_mut(task_id) {
                    t.retry_count = attempt;
                    t.last_error = Some(recorded);
                }
            },
            Some(ExecutionEvent::TaskRetrying {
                task_id,
                attempt,
                max_attempts,
                reason: event_reason,
            }),
        )
        .await
    }

    async fn fail_verification(
        &self,
        sink: &mut TransitionSink<'_>,
        task_id: Uuid,
        attempt: u32,
        reason: &str,
    ) -> EngineResult<TaskStatus> {
        let recorded = reason.to_string();
        sink.apply(
            move |state| {
                if let Some(t) = state.task_mut(task_id) {
                    t.retry_count = attempt;
                    t.last_error = Some(recorded);
                    let _ = t.transition_to(TaskStatus::Failed);
                }
            },
            Some(ExecutionEvent::TaskCompleted {
                task_id,
                status: TaskStatus::Failed,
            }),
        )
        .await?;
        Ok(TaskStatus::Failed)
    }

    async fn fail_infrastructure(
        &self,
        sink: &mut TransitionSink<'_>,
        task_id: Uuid,
        component: &str,
        message: &str,
    ) -> EngineResult<TaskStatus> {
        warn!(task_id = %task_id, component, message, "Infrastructure error");
        let recorded = format!("infrastructure: {component}: {message}");
        sink.apply(
            move |state| {
                if let Some(t) = state.task_mut(task_id) {
                    t.last_error = Some(recorded);
                    let _ = t.transition_to(TaskStatus::Failed);
                }
            },
            Some(ExecutionEvent::TaskCompleted {
                task_id,
                status: TaskStatus::Failed,
            }),
        )
        .await?;
        Ok(TaskStatus::Failed)
    }

    async fn finish_cancelled(
        &self,
        sink: &mut TransitionSink<'_>,
        task_id: Uuid,
    ) -> EngineResult<TaskStatus> {
        info!(task_id = %task_id, "Task cancelled");
        sink.apply(
            move |state| {
                if let Some(t) = state.task_mut(task_id) {
                    let _ = t.transition_to(TaskStatus::Cancelled);
                }
            },
            Some(ExecutionEvent::TaskCompleted {
                task_id,
                status: TaskStatus::Cancelled,
            }),
        )
        .await?;
        Ok(TaskStatus::Cancelled)
    }
}

/// Assemble the invocation request: task description (plus the follow-up
/// failure context on retries), project context and prior conversation.
fn build_request(
    task: &Task,
    state: &SessionState,
    followup: Option<&str>,
    settings: &Settings,
) -> AgentRequest {
    let mut description = task.description.clone();
    if let Some(followup) = followup {
        description.push_str("\n\n");
        description.push_str(followup);
    }

    let mut context = String::new();
    if let Some(project) = &state.project_context {
        context.push_str("[Project]\n");
        context.push_str(project);
        context.push('\n');
    }
    for entry in &state.conversation {
        context.push_str(&format!("[{}] {}\n", entry.role.as_str(), entry.content));
    }

    AgentRequest {
        task_id: task.id,
        description,
        context,
        model: settings.model.clone(),
        env_overrides: settings.env_overrides.clone(),
    }
}

/// Last `max_chars` of a string, on a char boundary.
fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ConversationEntry, ConversationRole};

    #[test]
    fn test_tail_truncates_from_front() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab", 3), "ab");
    }

    #[test]
    fn test_build_request_includes_context_and_followup() {
        let mut state = SessionState {
            project_context: Some("rust workspace".to_string()),
            ..SessionState::default()
        };
        state.record_conversation(ConversationEntry::new(
            ConversationRole::User,
            "build the parser first",
        ));
        let task = Task::new("Parser", "Implement the parser");
        state.insert_task(task.clone());

        let settings = state.settings.clone();
        let request = build_request(&task, &state, Some("fix the tests"), &settings);
        assert!(request.description.contains("Implement the parser"));
        assert!(request.description.contains("fix the tests"));
        assert!(request.context.contains("rust workspace"));
        assert!(request.context.contains("[user] build the parser first"));
    }
}
