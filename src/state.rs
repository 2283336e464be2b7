//! Persistent workflow state, one record per scope.
//!
//! A scope is either an interactive session (keyed by the host's session id)
//! or a supervised workflow run (keyed by a workflow id). Each scope owns a
//! directory under `~/.phasegate/tmp/` holding a single `state.json` record,
//! three summary markdown files, and a standalone `tests-passing` marker.
//!
//! Hook invocations are short-lived processes that may run concurrently
//! against the same scope, so `save` replaces the record atomically
//! (write-temp-then-rename); readers only ever see a complete record.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable pointing interactive scopes at a supervisor's
/// shared directory.
pub const WORKFLOW_DIR_ENV: &str = "PHASEGATE_WORKFLOW_DIR";
/// Workflow id exported by the supervisor to nested agent sessions.
pub const WORKFLOW_ID_ENV: &str = "PHASEGATE_WORKFLOW_ID";
/// Set to "1" by the supervisor so hooks can detect supervised runs.
pub const SUPERVISOR_ENV: &str = "PHASEGATE_SUPERVISOR";

const STATE_FILE: &str = "state.json";
const TESTS_PASSING_MARKER: &str = "tests-passing";

/// Phase outputs that require explicit confirmation before the workflow can
/// advance. Phase 4 has no flag; its terminal condition is the green test
/// run recorded by the tests-passing marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PhaseFlag {
    Requirements,
    Interfaces,
    Tests,
}

/// Which summary a phase produced for hand-off to later phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    Requirements,
    Interfaces,
    Tests,
}

impl SummaryKind {
    fn file_name(&self) -> &'static str {
        match self {
            SummaryKind::Requirements => "requirements-summary.md",
            SummaryKind::Interfaces => "interfaces.md",
            SummaryKind::Tests => "tests.md",
        }
    }
}

/// Per-phase completion flags, set by explicit external confirmation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletedPhases {
    #[serde(default)]
    pub requirements: bool,
    #[serde(default)]
    pub interfaces: bool,
    #[serde(default)]
    pub tests: bool,
}

/// The persisted workflow record for one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Current phase, always in 1..=4 after a load.
    pub phase: u8,
    /// Whether phase gating is enforced for this scope.
    #[serde(default)]
    pub active: bool,
    /// Whether this scope belongs to a supervised run.
    #[serde(default)]
    pub supervisor: bool,
    #[serde(default)]
    pub completed: CompletedPhases,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            phase: 1,
            active: false,
            supervisor: false,
            completed: CompletedPhases::default(),
        }
    }
}

impl WorkflowState {
    pub fn is_completed(&self, flag: PhaseFlag) -> bool {
        match flag {
            PhaseFlag::Requirements => self.completed.requirements,
            PhaseFlag::Interfaces => self.completed.interfaces,
            PhaseFlag::Tests => self.completed.tests,
        }
    }

    fn set_completed(&mut self, flag: PhaseFlag, value: bool) {
        match flag {
            PhaseFlag::Requirements => self.completed.requirements = value,
            PhaseFlag::Interfaces => self.completed.interfaces = value,
            PhaseFlag::Tests => self.completed.tests = value,
        }
    }
}

/// Load/save access to one scope's workflow state.
pub struct StateStore {
    scope_dir: PathBuf,
    scope_id: String,
}

impl StateStore {
    /// Resolve the store for an interactive session.
    ///
    /// When `PHASEGATE_WORKFLOW_DIR` is set, every session converges on that
    /// directory instead, so hooks running inside a supervised run share the
    /// supervisor's state.
    pub fn for_session(session_id: &str) -> Self {
        if let Ok(dir) = std::env::var(WORKFLOW_DIR_ENV)
            && !dir.is_empty()
        {
            let workflow_id = std::env::var(WORKFLOW_ID_ENV).unwrap_or_else(|_| "shared".into());
            return Self {
                scope_dir: PathBuf::from(dir),
                scope_id: workflow_id,
            };
        }
        Self {
            scope_dir: base_dir().join(format!("session-{}", session_id)),
            scope_id: session_id.to_string(),
        }
    }

    /// Resolve the store for a supervised workflow run.
    pub fn for_workflow(workflow_id: &str) -> Self {
        Self {
            scope_dir: base_dir().join(format!("workflow-{}", workflow_id)),
            scope_id: workflow_id.to_string(),
        }
    }

    /// A store rooted at an explicit directory (tests, custom layouts).
    pub fn at(scope_dir: impl Into<PathBuf>, scope_id: impl Into<String>) -> Self {
        Self {
            scope_dir: scope_dir.into(),
            scope_id: scope_id.into(),
        }
    }

    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    pub fn scope_dir(&self) -> &Path {
        &self.scope_dir
    }

    fn state_path(&self) -> PathBuf {
        self.scope_dir.join(STATE_FILE)
    }

    /// Load the record, creating the default when absent and repairing any
    /// malformed content to the default on the spot.
    ///
    /// A half-initialized directory (missing record, unparsable JSON, phase
    /// out of range) degrades to phase 1 rather than failing.
    pub fn load(&self) -> WorkflowState {
        let path = self.state_path();
        let Ok(content) = fs::read_to_string(&path) else {
            return WorkflowState::default();
        };

        match serde_json::from_str::<WorkflowState>(&content) {
            Ok(state) if (1..=4).contains(&state.phase) => state,
            Ok(mut state) => {
                tracing::warn!(scope = %self.scope_id, phase = state.phase, "repairing out-of-range phase");
                state.phase = 1;
                let _ = self.save(&state);
                state
            }
            Err(e) => {
                tracing::warn!(scope = %self.scope_id, error = %e, "repairing unparsable state record");
                let state = WorkflowState::default();
                let _ = self.save(&state);
                state
            }
        }
    }

    /// Atomically replace the persisted record.
    pub fn save(&self, state: &WorkflowState) -> Result<()> {
        fs::create_dir_all(&self.scope_dir).with_context(|| {
            format!("Failed to create scope directory: {}", self.scope_dir.display())
        })?;

        let content = serde_json::to_string_pretty(state)
            .context("Failed to serialize workflow state")?;

        let tmp = self.scope_dir.join(format!("{}.tmp", STATE_FILE));
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, self.state_path())
            .context("Failed to replace state file")?;

        Ok(())
    }

    /// Whether phase gating is enforced for this scope.
    pub fn is_active(&self) -> bool {
        self.load().active
    }

    /// Current phase (1-4), repaired if the record was malformed.
    pub fn phase(&self) -> u8 {
        self.load().phase
    }

    pub fn set_phase(&self, phase: u8) -> Result<()> {
        let mut state = self.load();
        state.phase = phase.clamp(1, 4);
        self.save(&state)
    }

    /// Turn gating on for a fresh workflow: phase 1, all flags clear.
    ///
    /// Also clears a stale terminal marker left by a previous round.
    pub fn activate(&self, supervisor: bool) -> Result<()> {
        let state = WorkflowState {
            phase: 1,
            active: true,
            supervisor,
            completed: CompletedPhases::default(),
        };
        self.save(&state)?;
        self.clear_tests_passing();
        Ok(())
    }

    pub fn mark_completed(&self, flag: PhaseFlag) -> Result<()> {
        let mut state = self.load();
        state.set_completed(flag, true);
        self.save(&state)
    }

    pub fn clear_completion(&self, flag: PhaseFlag) -> Result<()> {
        let mut state = self.load();
        state.set_completed(flag, false);
        self.save(&state)
    }

    /// Whether this scope belongs to a supervised run, from the record or
    /// the supervisor environment.
    pub fn is_supervised(&self) -> bool {
        if std::env::var(SUPERVISOR_ENV).map(|v| v == "1").unwrap_or(false) {
            return true;
        }
        self.load().supervisor
    }

    // Summaries

    pub fn save_summary(&self, kind: SummaryKind, text: &str) -> Result<()> {
        fs::create_dir_all(&self.scope_dir).with_context(|| {
            format!("Failed to create scope directory: {}", self.scope_dir.display())
        })?;
        let path = self.scope_dir.join(kind.file_name());
        fs::write(&path, text)
            .with_context(|| format!("Failed to write summary file: {}", path.display()))
    }

    /// Read a phase summary; absent files read as empty.
    pub fn summary(&self, kind: SummaryKind) -> String {
        fs::read_to_string(self.scope_dir.join(kind.file_name())).unwrap_or_default()
    }

    // Terminal success signal

    /// Record the terminal "tests passing" signal. Kept as a standalone
    /// marker so it survives `clear_workflow_markers` for one more read.
    pub fn mark_tests_passing(&self) -> Result<()> {
        fs::create_dir_all(&self.scope_dir).with_context(|| {
            format!("Failed to create scope directory: {}", self.scope_dir.display())
        })?;
        fs::write(self.scope_dir.join(TESTS_PASSING_MARKER), "")
            .context("Failed to create tests-passing marker")
    }

    pub fn tests_passing(&self) -> bool {
        self.scope_dir.join(TESTS_PASSING_MARKER).exists()
    }

    pub fn clear_tests_passing(&self) {
        let _ = fs::remove_file(self.scope_dir.join(TESTS_PASSING_MARKER));
    }

    /// Clear all transient phase/completion data but keep the terminal
    /// tests-passing marker; it is cleared on the next activation instead.
    pub fn clear_workflow_markers(&self) -> Result<()> {
        let _ = fs::remove_file(self.state_path());
        Ok(())
    }

    /// Delete the entire persisted scope.
    pub fn remove_scope(&self) -> Result<()> {
        if self.scope_dir.exists() {
            fs::remove_dir_all(&self.scope_dir).with_context(|| {
                format!("Failed to remove scope directory: {}", self.scope_dir.display())
            })?;
        }
        Ok(())
    }
}

fn base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".phasegate")
        .join("tmp")
}
