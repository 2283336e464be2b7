use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "phasegate")]
#[command(version, about = "Phase-gated TDD workflow engine for AI coding agents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// PreToolUse hook: gate file edits against the current phase
    Guard,
    /// Stop hook: run compile/test checks and advance the phase
    Orchestrate,
    /// PostToolUse hook: compile after source edits outside phase 4
    AutoCompile,
    /// SessionEnd hook: remove the session's workflow scope
    Cleanup,
    /// Start a phase-gated workflow for a scope
    Activate {
        /// Explicit scope directory
        #[arg(long)]
        scope: Option<PathBuf>,
        /// Session id owning the scope
        #[arg(long)]
        session: Option<String>,
    },
    /// Approve a phase's output so the next stop event can advance
    Confirm {
        target: cmd::ConfirmTarget,
        #[arg(long)]
        scope: Option<PathBuf>,
        #[arg(long)]
        session: Option<String>,
    },
    /// Show the workflow state for a scope
    Status {
        #[arg(long)]
        scope: Option<PathBuf>,
        #[arg(long)]
        session: Option<String>,
    },
    /// Run the supervised four-phase workflow loop
    Supervise {
        /// Project working directory (defaults to the current directory)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Initial task description for phase 1
        #[arg(long)]
        task: Option<String>,
        /// Agent CLI to drive (default: claude)
        #[arg(long)]
        agent: Option<String>,
        /// Per-turn timeout in seconds
        #[arg(long)]
        turn_timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout belongs to the hook protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Guard => cmd::cmd_guard()?,
        Commands::Orchestrate => cmd::cmd_orchestrate().await?,
        Commands::AutoCompile => cmd::cmd_auto_compile().await?,
        Commands::Cleanup => cmd::cmd_cleanup()?,
        Commands::Activate { scope, session } => cmd::cmd_activate(scope, session)?,
        Commands::Confirm {
            target,
            scope,
            session,
        } => cmd::cmd_confirm(target, scope, session)?,
        Commands::Status { scope, session } => cmd::cmd_status(scope, session)?,
        Commands::Supervise {
            dir,
            task,
            agent,
            turn_timeout,
        } => cmd::cmd_supervise(dir, task, agent, turn_timeout).await?,
    }
    Ok(())
}
