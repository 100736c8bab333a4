//! Scripted agent invoker for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::domain::ports::{AgentError, AgentInvoker, AgentOutcome, AgentRequest};

/// One scripted invocation.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Stream the chunks, then report semantic success.
    Succeed { chunks: Vec<String>, message: String },
    /// Stream nothing, report semantic failure (consumes a retry).
    ReportFailure { message: String },
    /// Fail with an infrastructure error.
    ProcessError { message: String },
    /// Stream the chunks, then block until cancelled.
    WaitForCancel { chunks: Vec<String> },
}

/// Agent invoker that replays a script, recording every request it saw.
pub struct MockAgentInvoker {
    script: Mutex<VecDeque<MockBehavior>>,
    requests: Mutex<Vec<AgentRequest>>,
    available: bool,
}

impl MockAgentInvoker {
    pub fn new(script: Vec<MockBehavior>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            available: true,
        }
    }

    /// An invoker whose availability probe fails.
    pub fn unavailable() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            available: false,
        }
    }

    /// Requests received so far, in invocation order.
    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentInvoker for MockAgentInvoker {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn invoke(
        &self,
        request: AgentRequest,
        chunks: mpsc::Sender<String>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<AgentOutcome, AgentError> {
        self.requests.lock().unwrap().push(request);
        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockBehavior::Succeed {
                chunks: Vec::new(),
                message: "ok".to_string(),
            });

        match behavior {
            MockBehavior::Succeed { chunks: scripted, message } => {
                for chunk in scripted {
                    let _ = chunks.send(chunk).await;
                }
                Ok(AgentOutcome {
                    success: true,
                    final_message: message,
                })
            }
            MockBehavior::ReportFailure { message } => Ok(AgentOutcome {
                success: false,
                final_message: message,
            }),
            MockBehavior::ProcessError { message } => Err(AgentError::ProcessFailed(message)),
            MockBehavior::WaitForCancel { chunks: scripted } => {
                for chunk in scripted {
                    let _ = chunks.send(chunk).await;
                }
                loop {
                    if *cancel.borrow_and_update() {
                        return Err(AgentError::Cancelled);
                    }
                    if cancel.changed().await.is_err() {
                        return Err(AgentError::Cancelled);
                    }
                }
            }
        }
    }
}
