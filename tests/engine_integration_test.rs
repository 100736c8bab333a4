//! End-to-end engine tests over scripted adapters: scheduling order, retry
//! semantics, failure attribution, stalling, cancellation and resumption.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{event_collector, execution_state, succeed, tests_fail, two_task_chain, Harness};
use foreman::domain::models::{ExecutionEvent, Phase, Task, TaskStatus, TestOutcome};
use foreman::domain::EngineError;
use foreman::infrastructure::agent::MockBehavior;
use foreman::infrastructure::vcs::MockVcs;

#[tokio::test]
async fn happy_path_runs_dependency_chain_and_commits() {
    let mut state = execution_state(3);
    let (a, b) = two_task_chain(&mut state);

    let harness = Harness::new(&state, vec![succeed(), succeed()]).await;
    let engine = harness.engine(Vec::new());
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.done, 2);
    assert!(summary.is_clean());
    assert_eq!(harness.vcs.commit_count(), 2);

    let reloaded = harness.store.load().await.unwrap();
    let task_a = reloaded.task(a.id).unwrap();
    let task_b = reloaded.task(b.id).unwrap();
    assert_eq!(task_a.status, TaskStatus::Done);
    assert_eq!(task_b.status, TaskStatus::Done);
    assert_eq!(task_a.commits.len(), 1);
    assert!(task_a.branch.as_deref().unwrap().starts_with("task/task-a-"));
    assert!(task_a.completed_at.is_some());
}

#[tokio::test]
async fn events_follow_task_causal_order() {
    let mut state = execution_state(0);
    let task = Task::new("Stream me", "do work");
    let task_id = task.id;
    state.insert_task(task);

    let harness = Harness::new(
        &state,
        vec![MockBehavior::Succeed {
            chunks: vec!["thinking".to_string(), "writing".to_string()],
            message: "ok".to_string(),
        }],
    )
    .await;
    let engine = harness.engine(Vec::new());
    let (tx, collector) = event_collector();
    engine.run_with_events(tx).await.unwrap();
    let events = collector.await.unwrap();

    let labels: Vec<&str> = events
        .iter()
        .map(|e| match e {
            ExecutionEvent::RunStarted { .. } => "run_started",
            ExecutionEvent::TaskStarted { .. } => "task_started",
            ExecutionEvent::AgentOutputChunk { .. } => "chunk",
            ExecutionEvent::TaskTestResult { .. } => "test_result",
            ExecutionEvent::TaskRetrying { .. } => "retrying",
            ExecutionEvent::TaskCompleted { .. } => "task_completed",
            ExecutionEvent::RunCompleted { .. } => "run_completed",
        })
        .collect();
    assert_eq!(
        labels,
        vec![
            "run_started",
            "task_started",
            "chunk",
            "chunk",
            "test_result",
            "task_completed",
            "run_completed"
        ]
    );

    // Chunks belong to the task that produced them
    for event in &events {
        if let ExecutionEvent::AgentOutputChunk { task_id: id, .. } = event {
            assert_eq!(*id, task_id);
        }
    }
}

#[tokio::test]
async fn retry_budget_two_fail_fail_pass_ends_done() {
    let mut state = execution_state(2);
    let task = Task::new("Flaky", "make the tests pass");
    let task_id = task.id;
    state.insert_task(task);

    // Three generation attempts; the agent is invoked once per attempt
    let harness = Harness::new(&state, vec![succeed(), succeed(), succeed()]).await;
    let engine = harness.engine(vec![
        tests_fail("assertion failed: left != right"),
        tests_fail("still broken"),
        TestOutcome::Passed {
            output: "all green".to_string(),
        },
    ]);
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.done, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(harness.vcs.commit_count(), 1);
    assert_eq!(harness.invoker.requests().len(), 3);

    let reloaded = harness.store.load().await.unwrap();
    let task = reloaded.task(task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(task.retry_count, 2);
    assert_eq!(task.commits.len(), 1);
    assert!(task.last_error.is_none());
}

#[tokio::test]
async fn retry_exhaustion_fails_after_exactly_budget_attempts() {
    let mut state = execution_state(2);
    let task = Task::new("Doomed", "cannot pass");
    let task_id = task.id;
    state.insert_task(task);

    let harness = Harness::new(&state, vec![succeed(), succeed(), succeed(), succeed()]).await;
    let engine = harness.engine(vec![
        tests_fail("boom 1"),
        tests_fail("boom 2"),
        tests_fail("boom 3"),
        tests_fail("boom 4"),
    ]);
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    // Budget 2 means 1 initial attempt + 2 retries, never more
    assert_eq!(harness.invoker.requests().len(), 3);
    assert_eq!(harness.vcs.commit_count(), 0);

    let reloaded = harness.store.load().await.unwrap();
    let task = reloaded.task(task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.retry_count, 2);
    assert!(task.last_error.as_deref().unwrap().contains("verification failed"));
}

#[tokio::test]
async fn retry_prompt_embeds_failure_output() {
    let mut state = execution_state(1);
    let task = Task::new("Retry prompt", "work");
    state.insert_task(task);

    let harness = Harness::new(&state, vec![succeed(), succeed()]).await;
    let engine = harness.engine(vec![
        tests_fail("unique-failure-marker-42"),
        TestOutcome::Passed {
            output: "ok".to_string(),
        },
    ]);
    engine.run().await.unwrap();

    let requests = harness.invoker.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].description.contains("unique-failure-marker-42"));
    assert!(requests[1].description.contains("unique-failure-marker-42"));
}

#[tokio::test]
async fn infrastructure_error_fails_without_consuming_retries() {
    let mut state = execution_state(3);
    let task = Task::new("No agent", "work");
    let task_id = task.id;
    state.insert_task(task);

    let harness = Harness::new(
        &state,
        vec![MockBehavior::ProcessError {
            message: "connection refused".to_string(),
        }],
    )
    .await;
    let engine = harness.engine(Vec::new());
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    // One invocation, no retries burned
    assert_eq!(harness.invoker.requests().len(), 1);

    let reloaded = harness.store.load().await.unwrap();
    let task = reloaded.task(task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.retry_count, 0);
    assert!(task.last_error.as_deref().unwrap().starts_with("infrastructure:"));
}

#[tokio::test]
async fn vcs_failure_is_infrastructure_error() {
    let mut state = execution_state(3);
    let task = Task::new("Commit fails", "work");
    let task_id = task.id;
    state.insert_task(task);

    let harness =
        Harness::with_vcs(&state, vec![succeed()], MockVcs::failing_commits()).await;
    let engine = harness.engine(Vec::new());
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    let reloaded = harness.store.load().await.unwrap();
    let task = reloaded.task(task_id).unwrap();
    assert_eq!(task.retry_count, 0);
    assert!(task.last_error.as_deref().unwrap().contains("infrastructure: vcs"));
}

#[tokio::test]
async fn failed_task_blocks_chain_and_stalls_plan() {
    let mut state = execution_state(0);
    let a = Task::new("A", "fails");
    let b = Task::new("B", "blocked").with_dependency(a.id);
    let c = Task::new("C", "also blocked").with_dependency(b.id);
    let (b_id, c_id) = (b.id, c.id);
    state.insert_task(a);
    state.insert_task(b);
    state.insert_task(c);

    let harness = Harness::new(&state, vec![succeed()]).await;
    let engine = harness.engine(vec![tests_fail("broken")]);
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.blocked, 2);
    assert!(summary.stalled);
    assert_eq!(harness.invoker.requests().len(), 1);

    // Blocked tasks never left pending
    let reloaded = harness.store.load().await.unwrap();
    assert_eq!(reloaded.task(b_id).unwrap().status, TaskStatus::Pending);
    assert_eq!(reloaded.task(c_id).unwrap().status, TaskStatus::Pending);
}

#[tokio::test]
async fn run_continues_past_failure_when_independent_work_remains() {
    let mut state = execution_state(0);
    let a = Task::new("A", "fails");
    let b = Task::new("B", "blocked").with_dependency(a.id);
    let c = Task::new("C", "independent");
    let c_id = c.id;
    state.insert_task(a);
    state.insert_task(b);
    state.insert_task(c);

    let harness = Harness::new(&state, vec![succeed(), succeed()]).await;
    let engine = harness.engine(vec![
        tests_fail("broken"),
        TestOutcome::Passed {
            output: "ok".to_string(),
        },
    ]);
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.done, 1);
    assert_eq!(summary.blocked, 1);
    assert!(!summary.stalled);

    let reloaded = harness.store.load().await.unwrap();
    assert_eq!(reloaded.task(c_id).unwrap().status, TaskStatus::Done);
}

#[tokio::test]
async fn skipped_verification_still_commits() {
    let mut state = execution_state(0);
    let task = Task::new("No tests here", "work");
    state.insert_task(task);

    let harness = Harness::new(&state, vec![succeed()]).await;
    let engine = harness.engine(vec![TestOutcome::Skipped {
        reason: "no recognized test configuration".to_string(),
    }]);
    let (tx, collector) = event_collector();
    let summary = engine.run_with_events(tx).await.unwrap();
    let events = collector.await.unwrap();

    assert_eq!(summary.done, 1);
    assert_eq!(harness.vcs.commit_count(), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        ExecutionEvent::TaskTestResult {
            outcome: TestOutcome::Skipped { .. },
            ..
        }
    )));
}

#[tokio::test]
async fn cancellation_during_generation_lands_cancelled_without_commit() {
    let mut state = execution_state(3);
    let task = Task::new("Long running", "work");
    let task_id = task.id;
    state.insert_task(task);

    let harness = Harness::new(
        &state,
        vec![MockBehavior::WaitForCancel {
            chunks: vec!["started...".to_string()],
        }],
    )
    .await;
    let engine = Arc::new(harness.engine(Vec::new()));
    let cancel = engine.cancel_token();

    let (tx, collector) = event_collector();
    let run = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run_with_events(tx).await })
    };
    // Let the task reach the generating state, then cancel
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let summary = run.await.unwrap().unwrap();
    let events = collector.await.unwrap();

    assert_eq!(summary.cancelled, 1);
    assert_eq!(harness.vcs.commit_count(), 0);
    assert!(events.iter().any(|e| matches!(
        e,
        ExecutionEvent::TaskCompleted {
            status: TaskStatus::Cancelled,
            ..
        }
    )));

    // Store stays consistent on reload
    let reloaded = harness.store.load().await.unwrap();
    let task = reloaded.task(task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(task.commits.is_empty());
    assert!(task.completed_at.is_some());
}

#[tokio::test]
async fn resume_does_not_rerun_done_tasks() {
    let mut state = execution_state(0);
    let (a, b) = two_task_chain(&mut state);

    // First run: A succeeds, B fails verification with no budget
    let harness = Harness::new(&state, vec![succeed(), succeed()]).await;
    let engine = harness.engine(vec![
        TestOutcome::Passed {
            output: "ok".to_string(),
        },
        tests_fail("broken"),
    ]);
    let summary = engine.run().await.unwrap();
    assert_eq!(summary.done, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(harness.invoker.requests().len(), 2);

    // User resets the failed task between runs
    let mut resumed = harness.store.load().await.unwrap();
    resumed.task_mut(b.id).unwrap().reset().unwrap();
    harness.store.save(&resumed).await.unwrap();

    // Second run re-executes only B
    let engine = harness.engine(Vec::new());
    let summary = engine.run().await.unwrap();
    assert_eq!(summary.done, 2);
    assert_eq!(summary.failed, 0);

    let requests = harness.invoker.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].task_id, b.id);
    assert_eq!(requests.iter().filter(|r| r.task_id == a.id).count(), 1);
}

#[tokio::test]
async fn resume_picks_up_task_interrupted_mid_flight() {
    // A crash mid-task leaves the task in_progress with its branch
    // assigned; reloading and resuming re-runs exactly that task.
    let mut state = execution_state(1);
    let mut task = Task::new("Interrupted", "work");
    task.transition_to(TaskStatus::InProgress).unwrap();
    task.branch = Some(task.branch_name());
    task.retry_count = 1;
    let task_id = task.id;
    state.insert_task(task);

    let harness = Harness::new(&state, vec![succeed()]).await;
    let engine = harness.engine(Vec::new());
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.done, 1);
    let reloaded = harness.store.load().await.unwrap();
    let task = reloaded.task(task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    // The interrupted attempt's consumed budget is not regained
    assert_eq!(task.retry_count, 1);
}

#[tokio::test]
async fn run_outside_execution_phase_is_configuration_error() {
    let mut state = execution_state(3);
    state.phase = Phase::Planning;
    let harness = Harness::new(&state, Vec::new()).await;
    let engine = harness.engine(Vec::new());

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}

#[tokio::test]
async fn cyclic_plan_aborts_before_any_task_starts() {
    let mut state = execution_state(3);
    let mut a = Task::new("A", "d");
    let mut b = Task::new("B", "d");
    let (a_id, b_id) = (a.id, b.id);
    a.depends_on.push(b_id);
    b.depends_on.push(a_id);
    state.insert_task(a);
    state.insert_task(b);

    let harness = Harness::new(&state, Vec::new()).await;
    let engine = harness.engine(Vec::new());
    let err = engine.run().await.unwrap_err();
    match err {
        EngineError::DependencyCycle(cycle) => {
            assert!(cycle.contains(&a_id));
            assert!(cycle.contains(&b_id));
        }
        other => panic!("expected DependencyCycle, got {other:?}"),
    }
    assert!(harness.invoker.requests().is_empty());
}

#[tokio::test]
async fn agent_reported_failure_consumes_retry_budget() {
    let mut state = execution_state(1);
    let task = Task::new("Agent struggles", "work");
    let task_id = task.id;
    state.insert_task(task);

    let harness = Harness::new(
        &state,
        vec![
            MockBehavior::ReportFailure {
                message: "could not find the file".to_string(),
            },
            succeed(),
        ],
    )
    .await;
    let engine = harness.engine(Vec::new());
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.done, 1);
    let reloaded = harness.store.load().await.unwrap();
    assert_eq!(reloaded.task(task_id).unwrap().retry_count, 1);

    let requests = harness.invoker.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].description.contains("could not find the file"));
}
