//! Shared test harness: session store in a temp dir, scripted adapters.

use std::sync::Arc;

use tokio::sync::mpsc;

use foreman::domain::models::{
    ExecutionEvent, Phase, SessionState, Settings, Task, TestOutcome,
};
use foreman::infrastructure::agent::{MockAgentInvoker, MockBehavior};
use foreman::infrastructure::vcs::MockVcs;
use foreman::infrastructure::verify::ScriptedVerifier;
use foreman::services::{ExecutionEngine, TaskExecutor};
use foreman::store::SessionStore;

/// A session in the execution phase with the given retry budget.
pub fn execution_state(max_retries: u32) -> SessionState {
    SessionState {
        phase: Phase::Execution,
        settings: Settings {
            max_retries,
            ..Settings::default()
        },
        ..SessionState::default()
    }
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub store: SessionStore,
    pub invoker: Arc<MockAgentInvoker>,
    pub vcs: Arc<MockVcs>,
}

impl Harness {
    pub async fn new(state: &SessionState, script: Vec<MockBehavior>) -> Self {
        Self::with_vcs(state, script, MockVcs::new()).await
    }

    pub async fn with_vcs(state: &SessionState, script: Vec<MockBehavior>, vcs: MockVcs) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        store.save(state).await.unwrap();
        Self {
            dir,
            store,
            invoker: Arc::new(MockAgentInvoker::new(script)),
            vcs: Arc::new(vcs),
        }
    }

    /// Build an engine whose verifier replays `outcomes` (then passes).
    pub fn engine(&self, outcomes: Vec<TestOutcome>) -> ExecutionEngine {
        let verifier = Arc::new(ScriptedVerifier::new(outcomes));
        let executor = TaskExecutor::new(
            self.invoker.clone(),
            verifier,
            self.vcs.clone(),
            self.dir.path(),
        );
        ExecutionEngine::new(self.store.clone(), executor)
    }
}

/// Channel plus a collector task gathering every event.
pub fn event_collector() -> (
    mpsc::Sender<ExecutionEvent>,
    tokio::task::JoinHandle<Vec<ExecutionEvent>>,
) {
    let (tx, mut rx) = mpsc::channel(1024);
    let handle = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    });
    (tx, handle)
}

/// Convenience: scripted agent success with no streamed chunks.
pub fn succeed() -> MockBehavior {
    MockBehavior::Succeed {
        chunks: Vec::new(),
        message: "ok".to_string(),
    }
}

/// Convenience: a failing verification outcome.
pub fn tests_fail(output: &str) -> TestOutcome {
    TestOutcome::Failed {
        output: output.to_string(),
    }
}

/// Build a linear plan A -> B (B depends on A) in the given state.
pub fn two_task_chain(state: &mut SessionState) -> (Task, Task) {
    let a = Task::new("Task A", "first");
    let b = Task::new("Task B", "second").with_dependency(a.id);
    state.insert_task(a.clone());
    state.insert_task(b.clone());
    (a, b)
}
