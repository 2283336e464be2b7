//! Operator commands for inspecting and driving a workflow scope.

use anyhow::Result;
use clap::ValueEnum;
use console::style;
use std::path::PathBuf;

use phasegate::state::{PhaseFlag, StateStore, SummaryKind};
use phasegate::supervisor::context::phase_name;

/// Which completion flag `phasegate confirm` sets.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfirmTarget {
    Requirements,
    Interfaces,
    Tests,
}

impl ConfirmTarget {
    fn flag(self) -> PhaseFlag {
        match self {
            ConfirmTarget::Requirements => PhaseFlag::Requirements,
            ConfirmTarget::Interfaces => PhaseFlag::Interfaces,
            ConfirmTarget::Tests => PhaseFlag::Tests,
        }
    }
}

/// Resolve the scope a workflow command operates on: explicit directory,
/// explicit session id, or the environment-derived session scope.
fn resolve_store(scope: Option<PathBuf>, session: Option<String>) -> StateStore {
    match (scope, session) {
        (Some(dir), _) => {
            let id = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "scope".to_string());
            StateStore::at(dir, id)
        }
        (None, Some(id)) => StateStore::for_session(&id),
        (None, None) => StateStore::for_session("default"),
    }
}

/// Turn phase gating on for a scope, starting a fresh workflow at phase 1.
pub fn cmd_activate(scope: Option<PathBuf>, session: Option<String>) -> Result<()> {
    let store = resolve_store(scope, session);
    store.activate(false)?;
    println!(
        "Workflow activated at phase 1 (Requirements).\n  scope: {}",
        store.scope_dir().display()
    );
    Ok(())
}

/// Record explicit approval of a phase's output.
pub fn cmd_confirm(
    target: ConfirmTarget,
    scope: Option<PathBuf>,
    session: Option<String>,
) -> Result<()> {
    let store = resolve_store(scope, session);
    store.mark_completed(target.flag())?;
    println!(
        "Confirmed: {:?}. The next stop event can advance the phase.",
        target
    );
    Ok(())
}

/// Print the workflow state for a scope.
pub fn cmd_status(scope: Option<PathBuf>, session: Option<String>) -> Result<()> {
    let store = resolve_store(scope, session);
    let state = store.load();

    println!("{}", style("Workflow status").bold());
    println!("  scope:   {}", store.scope_dir().display());
    println!("  active:  {}", state.active);
    if state.active {
        println!("  phase:   {} ({})", state.phase, phase_name(state.phase));
        if state.supervisor {
            println!("  mode:    supervised");
        }
    }

    let check = |done: bool| if done { "[x]" } else { "[ ]" };
    println!("  confirmed:");
    println!("    {} requirements", check(state.completed.requirements));
    println!("    {} interfaces", check(state.completed.interfaces));
    println!("    {} tests", check(state.completed.tests));

    let summaries = [
        (SummaryKind::Requirements, "requirements"),
        (SummaryKind::Interfaces, "interfaces"),
        (SummaryKind::Tests, "tests"),
    ];
    let saved: Vec<&str> = summaries
        .iter()
        .filter(|(kind, _)| !store.summary(*kind).is_empty())
        .map(|(_, label)| *label)
        .collect();
    if !saved.is_empty() {
        println!("  summaries: {}", saved.join(", "));
    }

    if store.tests_passing() {
        println!("  {}", style("tests passing").green());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_activate_then_confirm_sets_flag() {
        let dir = tempdir().unwrap();
        let scope = dir.path().join("scope");

        cmd_activate(Some(scope.clone()), None).unwrap();
        cmd_confirm(ConfirmTarget::Requirements, Some(scope.clone()), None).unwrap();

        let store = StateStore::at(&scope, "scope");
        let state = store.load();
        assert!(state.active);
        assert!(state.completed.requirements);
        assert!(!state.completed.interfaces);
    }

    #[test]
    fn test_status_tolerates_empty_scope() {
        let dir = tempdir().unwrap();
        cmd_status(Some(dir.path().join("nothing-here")), None).unwrap();
    }
}
