//! `phasegate supervise`: run the four-phase workflow under supervision.

use anyhow::Result;
use std::path::PathBuf;

use phasegate::supervisor::Supervisor;
use phasegate::supervisor::session::AgentConfig;

pub async fn cmd_supervise(
    dir: Option<PathBuf>,
    task: Option<String>,
    agent_command: Option<String>,
    turn_timeout: Option<u64>,
) -> Result<()> {
    let working_dir = match dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let mut agent = AgentConfig::default();
    if let Some(command) = agent_command {
        agent.command = command;
    }
    if let Some(secs) = turn_timeout {
        agent.turn_timeout_secs = secs;
    }

    let supervisor = Supervisor::new(working_dir, agent)?;
    match supervisor.run(task.as_deref()).await {
        Ok(()) => Ok(()),
        // A user abort is a clean exit, not a failure
        Err(e) if e.is_abort() => Ok(()),
        Err(e) => Err(e.into()),
    }
}
