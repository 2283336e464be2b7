//! Typed errors for the supervised workflow boundary.
//!
//! Hook decisions are not errors: a Block is a normal outcome and external
//! command failures are coerced into captured output, so the hooks stay on
//! `anyhow::Result` for genuinely unexpected faults only. The supervisor is
//! different: a user abort must be distinguishable from a real fault because
//! both clean up the scope but only one is a failure exit.

use thiserror::Error;

/// Errors from a supervised workflow run.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Controlled cancellation: the operator aborted the workflow.
    /// Always triggers full scope cleanup before propagating.
    #[error("Workflow aborted by user")]
    Aborted,

    #[error("Failed to spawn agent process '{command}': {source}")]
    AgentSpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SupervisorError {
    pub fn is_abort(&self) -> bool {
        matches!(self, SupervisorError::Aborted)
    }
}
