//! Verification runner.
//!
//! Detects the project's test command from common per-language
//! configuration markers (or the settings override) and runs it, capturing
//! combined output. Projects with no recognized test configuration get the
//! distinct skipped outcome.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::domain::models::TestOutcome;
use crate::domain::ports::{VerificationRunner, VerifierError};

/// Captured test output kept per outcome; long logs are tail-truncated.
const OUTPUT_TAIL_BYTES: usize = 64 * 1024;

/// Test runner shelling out to the detected (or configured) command.
pub struct TestCommandRunner {
    /// Override from settings, run through `sh -c`
    override_command: Option<String>,
}

impl TestCommandRunner {
    pub fn new(override_command: Option<String>) -> Self {
        Self { override_command }
    }

    /// Detect the test command for a repository root.
    ///
    /// Returns `(program, args, label)`, or `None` when no marker matches.
    pub fn detect(root: &Path) -> Option<(String, Vec<String>, &'static str)> {
        let exists = |name: &str| root.join(name).exists();
        if exists("Cargo.toml") {
            return Some(("cargo".into(), vec!["test".into()], "cargo"));
        }
        if exists("package.json") {
            return Some((
                "npm".into(),
                vec!["test".into(), "--silent".into()],
                "npm",
            ));
        }
        if exists("pyproject.toml") || exists("pytest.ini") || exists("setup.py") {
            return Some((
                "python".into(),
                vec!["-m".into(), "pytest".into()],
                "pytest",
            ));
        }
        if exists("go.mod") {
            return Some(("go".into(), vec!["test".into(), "./...".into()], "go"));
        }
        if exists("Makefile") {
            return Some(("make".into(), vec!["test".into()], "make"));
        }
        None
    }
}

#[async_trait]
impl VerificationRunner for TestCommandRunner {
    #[instrument(skip(self, repo_root), fields(root = %repo_root.display()))]
    async fn run(&self, repo_root: &Path) -> Result<TestOutcome, VerifierError> {
        let (program, args, label) = match &self.override_command {
            Some(command) => ("sh".to_string(), vec!["-c".to_string(), command.clone()], "override"),
            None => match Self::detect(repo_root) {
                Some(found) => found,
                None => {
                    return Ok(TestOutcome::Skipped {
                        reason: "no recognized test configuration".to_string(),
                    })
                }
            },
        };

        debug!(label, "Running verification");
        let result = Command::new(&program)
            .args(&args)
            .current_dir(repo_root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| VerifierError::Spawn(format!("{program}: {e}")))?;

        let mut output = String::from_utf8_lossy(&result.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&result.stderr));
        let output = tail_bytes(&output, OUTPUT_TAIL_BYTES);

        if result.status.success() {
            Ok(TestOutcome::Passed { output })
        } else {
            Ok(TestOutcome::Failed { output })
        }
    }
}

/// Keep the last `max` bytes of a string, on a char boundary.
fn tail_bytes(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

/// Scripted verification runner for tests: replays a sequence of outcomes.
pub struct ScriptedVerifier {
    outcomes: std::sync::Mutex<std::collections::VecDeque<TestOutcome>>,
}

impl ScriptedVerifier {
    pub fn new(outcomes: Vec<TestOutcome>) -> Self {
        Self {
            outcomes: std::sync::Mutex::new(outcomes.into()),
        }
    }

    /// Verifier that always passes.
    pub fn passing() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl VerificationRunner for ScriptedVerifier {
    async fn run(&self, _repo_root: &Path) -> Result<TestOutcome, VerifierError> {
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| TestOutcome::Passed {
                output: "ok".to_string(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_cargo_marker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        let (program, args, label) = TestCommandRunner::detect(dir.path()).unwrap();
        assert_eq!(program, "cargo");
        assert_eq!(args, vec!["test"]);
        assert_eq!(label, "cargo");
    }

    #[test]
    fn test_detect_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TestCommandRunner::detect(dir.path()).is_none());
    }

    #[tokio::test]
    async fn test_no_marker_is_skipped_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TestCommandRunner::new(None);
        let outcome = runner.run(dir.path()).await.unwrap();
        assert!(matches!(outcome, TestOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_override_command_runs() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TestCommandRunner::new(Some("exit 0".to_string()));
        let outcome = runner.run(dir.path()).await.unwrap();
        assert!(outcome.passed());

        let runner = TestCommandRunner::new(Some("echo boom && exit 1".to_string()));
        let outcome = runner.run(dir.path()).await.unwrap();
        match outcome {
            TestOutcome::Failed { output } => assert!(output.contains("boom")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_tail_bytes_boundary() {
        assert_eq!(tail_bytes("hello", 3), "llo");
        assert_eq!(tail_bytes("hi", 10), "hi");
    }
}
