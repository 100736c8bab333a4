//! Startup dependency gate.
//!
//! Probes the external tools once before a run begins. A missing tool is a
//! configuration error that aborts before any task starts.

use std::sync::Arc;

use tracing::info;

use crate::domain::ports::{AgentInvoker, VcsDriver};
use crate::domain::{EngineError, EngineResult};

/// Result of probing one external tool.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub name: String,
    pub available: bool,
}

/// Probe git and the configured agent tool.
pub async fn run_checks(
    vcs: &Arc<dyn VcsDriver>,
    invoker: &Arc<dyn AgentInvoker>,
) -> Vec<CheckReport> {
    let git_ok = vcs.is_available().await;
    let agent_ok = invoker.is_available().await;
    vec![
        CheckReport {
            name: "git repository".to_string(),
            available: git_ok,
        },
        CheckReport {
            name: format!("agent ({})", invoker.name()),
            available: agent_ok,
        },
    ]
}

/// Run the gate: every probe must pass or the run aborts.
pub async fn gate(
    vcs: &Arc<dyn VcsDriver>,
    invoker: &Arc<dyn AgentInvoker>,
) -> EngineResult<Vec<CheckReport>> {
    let reports = run_checks(vcs, invoker).await;
    let missing: Vec<&str> = reports
        .iter()
        .filter(|r| !r.available)
        .map(|r| r.name.as_str())
        .collect();
    if missing.is_empty() {
        info!("Startup checks passed");
        Ok(reports)
    } else {
        Err(EngineError::Configuration(format!(
            "missing required tools: {}",
            missing.join(", ")
        )))
    }
}
