//! Supervised four-phase workflow loop.
//!
//! Instead of reacting to host edit/stop events, the supervisor drives the
//! phases itself: each phase runs as its own agent session with clean
//! context, carrying only the persisted summaries of earlier phases. Hooks
//! spawned by the nested agent converge on the supervisor's scope through
//! the exported environment variables, so edit gating still applies while
//! phase transitions stay under the supervisor's control.

pub mod context;
pub mod input;
pub mod session;

use anyhow::{Context, anyhow};
use chrono::Utc;
use console::style;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, Lines};

use crate::errors::SupervisorError;
use crate::state::{SUPERVISOR_ENV, StateStore, SummaryKind, WORKFLOW_DIR_ENV, WORKFLOW_ID_ENV};
use context::{PHASE_COMPLETE, phase_name};
use input::UserInput;
use session::{AgentConfig, AgentSession};

pub struct Supervisor {
    store: StateStore,
    working_dir: PathBuf,
    agent: AgentConfig,
}

impl Supervisor {
    pub fn new(working_dir: impl Into<PathBuf>, agent: AgentConfig) -> Result<Self, SupervisorError> {
        let working_dir = working_dir.into();
        if !working_dir.is_dir() {
            return Err(SupervisorError::Other(anyhow!(
                "Working directory does not exist: {}",
                working_dir.display()
            )));
        }
        let workflow_id = format!("{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), std::process::id());
        Ok(Self {
            store: StateStore::for_workflow(&workflow_id),
            working_dir,
            agent,
        })
    }

    /// A supervisor over an explicit store (tests, custom scope layouts).
    pub fn with_store(store: StateStore, working_dir: impl Into<PathBuf>, agent: AgentConfig) -> Self {
        Self {
            store,
            working_dir: working_dir.into(),
            agent,
        }
    }

    /// Environment exported to every nested agent call so its hooks share
    /// this workflow's scope.
    fn agent_env(&self) -> Vec<(String, String)> {
        vec![
            (
                WORKFLOW_DIR_ENV.to_string(),
                self.store.scope_dir().to_string_lossy().into_owned(),
            ),
            (WORKFLOW_ID_ENV.to_string(), self.store.scope_id().to_string()),
            (SUPERVISOR_ENV.to_string(), "1".to_string()),
        ]
    }

    /// Run the whole workflow. Any cancellation or fault destroys the
    /// persisted scope before propagating; there is no partial resume.
    pub async fn run(&self, task: Option<&str>) -> Result<(), SupervisorError> {
        println!(
            "{}",
            style(format!(
                "Supervised TDD workflow\n  project:  {}\n  workflow: {}",
                self.working_dir.display(),
                self.store.scope_id()
            ))
            .cyan()
        );

        let result = self.run_inner(task).await;
        if let Err(e) = &result {
            if e.is_abort() {
                println!("\nWorkflow aborted.");
            }
            let _ = self.store.remove_scope();
            eprintln!(">>> phasegate: workflow scope cleaned up");
        }
        result
    }

    async fn run_inner(&self, task: Option<&str>) -> Result<(), SupervisorError> {
        self.store.activate(true)?;

        // One stdin reader for the whole run; a reader per prompt would
        // drop partially-buffered input between prompts.
        let mut lines = input::stdin_lines();
        for phase in 1..=4 {
            self.run_phase(&mut lines, phase, if phase == 1 { task } else { None })
                .await?;
        }

        println!("{}", style("\nTDD workflow complete.").green().bold());
        self.store.remove_scope()?;
        Ok(())
    }

    async fn run_phase<R: AsyncBufRead + Unpin>(
        &self,
        lines: &mut Lines<R>,
        phase: u8,
        task: Option<&str>,
    ) -> Result<(), SupervisorError> {
        println!(
            "\n{}",
            style(format!("=== Phase {}: {} ===", phase, phase_name(phase))).cyan().bold()
        );
        self.store.set_phase(phase)?;

        let ctx = context::phase_context(
            phase,
            task,
            &self.store.summary(SummaryKind::Requirements),
            &self.store.summary(SummaryKind::Interfaces),
            &self.store.summary(SummaryKind::Tests),
        );

        // Fresh session per phase; only the summaries carry over.
        let mut session = AgentSession::new(self.agent.clone(), &self.working_dir, self.agent_env());

        turn_loop(&mut session, lines, &ctx).await?;

        if phase < 4 {
            let summary = self.summarize(&mut session, phase).await?;
            let kind = match phase {
                1 => SummaryKind::Requirements,
                2 => SummaryKind::Interfaces,
                _ => SummaryKind::Tests,
            };
            self.store.save_summary(kind, &summary)?;
            println!("\n[Supervisor] {} summary saved.", phase_name(phase));
            self.confirm_continue(phase)?;
        } else {
            println!("\n[Supervisor] Implementation complete - all tests passing.");
        }

        Ok(())
    }

    /// Generate the phase summary, then have the agent self-review it.
    async fn summarize(
        &self,
        session: &mut AgentSession,
        phase: u8,
    ) -> Result<String, SupervisorError> {
        let Some(prompt) = context::summary_prompt(phase) else {
            return Ok(String::new());
        };
        println!("\n[Supervisor] Generating {} summary...", phase_name(phase));
        let initial = session.turn(prompt, PHASE_COMPLETE, false).await?.text;

        let Some(review) = context::review_prompt(phase) else {
            return Ok(initial);
        };
        println!("[Supervisor] Verifying summary completeness...");
        let response = session.turn(&review, PHASE_COMPLETE, false).await?.text;

        Ok(context::resolve_review(&initial, &response))
    }

    fn confirm_continue(&self, phase: u8) -> Result<(), SupervisorError> {
        let proceed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Phase {} ({}) complete. Proceed to Phase {} ({})?",
                phase,
                phase_name(phase),
                phase + 1,
                phase_name(phase + 1)
            ))
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
        if proceed {
            Ok(())
        } else {
            Err(SupervisorError::Aborted)
        }
    }
}

/// Converse until the agent emits the completion marker or the user forces
/// an outcome. Human input continues the same session as further turns.
async fn turn_loop<R: AsyncBufRead + Unpin>(
    session: &mut AgentSession,
    lines: &mut Lines<R>,
    ctx: &str,
) -> Result<(), SupervisorError> {
    let first = session.turn(ctx, PHASE_COMPLETE, true).await?;
    let mut complete = first.marker_found;

    while !complete {
        let Some(raw) = input::read_multiline(lines, "\nYou: ").await else {
            // Stdin closed under us; treat like an abort
            return Err(SupervisorError::Aborted);
        };
        if raw.trim().is_empty() {
            continue;
        }
        match input::interpret(&raw) {
            UserInput::Complete => break,
            UserInput::Abort => return Err(SupervisorError::Aborted),
            UserInput::LoadFile(path) => match std::fs::read_to_string(&path) {
                Ok(contents) => {
                    eprintln!(">>> phasegate: sending contents of {}", path.display());
                    complete = session.turn(&contents, PHASE_COMPLETE, true).await?.marker_found;
                }
                Err(e) => {
                    eprintln!(">>> phasegate: could not read {}: {}", path.display(), e);
                }
            },
            UserInput::Text(text) => {
                complete = session.turn(&text, PHASE_COMPLETE, true).await?.marker_found;
            }
        }
    }
    Ok(())
}
