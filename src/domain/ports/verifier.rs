//! Verification runner port - interface to the project's test tooling.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::TestOutcome;

/// Failure to launch verification at all. A test run that executes and
/// fails is a [`TestOutcome::Failed`], not an error.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("test command failed to launch: {0}")]
    Spawn(String),
}

/// Runs the project's tests and reports pass/fail plus captured output.
#[async_trait]
pub trait VerificationRunner: Send + Sync {
    async fn run(&self, repo_root: &Path) -> Result<TestOutcome, VerifierError>;
}
