//! Ports: capability interfaces to the external processes the engine
//! coordinates. Implementations live in `infrastructure`.

pub mod agent;
pub mod vcs;
pub mod verifier;

pub use agent::{AgentError, AgentInvoker, AgentOutcome, AgentRequest};
pub use vcs::{VcsDriver, VcsError};
pub use verifier::{VerificationRunner, VerifierError};
