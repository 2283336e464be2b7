//! Hook entry points: one function per host hook.
//!
//! Each reads the action event from stdin, consults the scope's state, and
//! either stays silent (implicit allow) or prints a decision JSON to stdout.
//! Operator-visible progress goes to stderr only.

use anyhow::Result;

use phasegate::agents::GuidanceLoader;
use phasegate::guard::{self, Decision, EditRequest};
use phasegate::hook::{HookEvent, HookResponse};
use phasegate::orchestrator::{Orchestrator, StopOutcome, run_command, usable_project_dir};
use phasegate::patterns::classify;
use phasegate::profile::{CommandKind, ProfileConfig};
use phasegate::state::StateStore;

/// PreToolUse: gate a proposed file edit against the current phase.
pub fn cmd_guard() -> Result<()> {
    let event = HookEvent::from_reader(std::io::stdin());

    if !event.is_edit_tool() {
        return Ok(());
    }
    let Some(path) = event.file_path() else {
        return Ok(());
    };

    let store = StateStore::for_session(&event.session_id);
    let state = store.load();
    if !state.active {
        return Ok(());
    }

    let config = ProfileConfig::load_or_default()?;
    let profile = usable_project_dir(&event.cwd)
        .and_then(|dir| config.resolve_active(dir))
        .map(|(_, profile)| profile);
    let guidance = GuidanceLoader::from_env().load_for_phase(state.phase);

    match guard::evaluate(&EditRequest { path }, &state, profile, &guidance) {
        Decision::Allow => {}
        Decision::Block { reason } => {
            eprintln!(
                ">>> phasegate: blocked edit to {} (phase {})",
                path, state.phase
            );
            HookResponse::block(reason).emit();
        }
    }
    Ok(())
}

/// Stop: run the phase state machine.
pub async fn cmd_orchestrate() -> Result<()> {
    let event = HookEvent::from_reader(std::io::stdin());

    if event.stop_hook_active {
        return Ok(());
    }

    let store = StateStore::for_session(&event.session_id);
    if !store.is_active() {
        return Ok(());
    }

    // Supervised runs own their transitions; the hook only relays guidance.
    if store.is_supervised() {
        let guidance = GuidanceLoader::from_env().load_for_phase(store.phase());
        if !guidance.is_empty() {
            HookResponse::approve_with_context("Supervised workflow", "Stop", guidance).emit();
        }
        return Ok(());
    }

    let Some(project_dir) = usable_project_dir(&event.cwd) else {
        return Ok(());
    };

    let config = ProfileConfig::load_or_default()?;
    let profile = config.resolve_active(project_dir).map(|(_, profile)| profile);
    let guidance = GuidanceLoader::from_env();
    let orchestrator = Orchestrator::new(
        &store,
        &guidance,
        profile,
        config.timeouts.clone(),
        project_dir,
    );

    match orchestrator.advance(event.stop_hook_active).await? {
        StopOutcome::Allow | StopOutcome::Complete => {}
        StopOutcome::Approve { guidance } => {
            if !guidance.is_empty() {
                HookResponse::approve_with_context("Supervised workflow", "Stop", guidance).emit();
            }
        }
        StopOutcome::Block { reason } => HookResponse::block(reason).emit(),
    }
    Ok(())
}

/// PostToolUse: compile after a source edit, outside phase 4.
pub async fn cmd_auto_compile() -> Result<()> {
    let event = HookEvent::from_reader(std::io::stdin());

    if !event.is_edit_tool() {
        return Ok(());
    }
    let Some(path) = event.file_path() else {
        return Ok(());
    };
    let Some(project_dir) = usable_project_dir(&event.cwd) else {
        return Ok(());
    };

    let config = ProfileConfig::load_or_default()?;
    let Some((id, profile)) = config.resolve_active(project_dir) else {
        return Ok(());
    };

    if !classify(path, &profile.patterns).is_source() {
        return Ok(());
    }

    // Phase 4 compiles and tests through the stop hook instead
    let store = StateStore::for_session(&event.session_id);
    let state = store.load();
    if state.active && state.phase == 4 {
        return Ok(());
    }

    let Some(compile_cmd) = profile.command(CommandKind::Compile) else {
        return Ok(());
    };

    let name = profile.display_name(id);
    eprintln!(">>> phasegate: auto-compiling ({}) after source change...", name);

    let outcome = run_command(compile_cmd, project_dir, config.timeouts.compile_secs).await;
    if outcome.success() {
        eprintln!(">>> phasegate: compilation successful");
        return Ok(());
    }

    eprintln!(">>> phasegate: compilation failed");
    HookResponse::approve_with_context(
        format!("Compilation failed ({}). Fix the errors immediately.", name),
        "PostToolUse",
        format!("Compile errors after editing {}:\n\n{}", path, outcome.output),
    )
    .emit();
    Ok(())
}

/// SessionEnd: drop the session's persisted scope.
pub fn cmd_cleanup() -> Result<()> {
    let event = HookEvent::from_reader(std::io::stdin());

    if event.hook_event_name != "SessionEnd" {
        return Ok(());
    }

    let store = StateStore::for_session(&event.session_id);
    // A nested agent session must not tear down the supervisor's scope
    if store.is_supervised() {
        tracing::debug!(scope = %store.scope_id(), "supervised scope, skipping cleanup");
        return Ok(());
    }

    tracing::debug!(scope = %store.scope_id(), "session ended, removing scope");
    store.remove_scope()
}
