//! Phase progression state machine, run on every stop event.
//!
//! Phases advance 1 → 2 → 3 → 4 → Complete, each gated by a completion
//! flag and (from phase 2 on) a fresh external command check. A single
//! invocation falls through as many transitions as the preconditions
//! already allow, so an agent that satisfied several phases between stop
//! events is not blocked once per phase.
//!
//! Compile and test checks are never cached; a regression discovered after
//! a phase was approved still blocks, without regressing the phase number.

pub mod exec;

pub use exec::{run_command, CommandOutcome};

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::agents::GuidanceLoader;
use crate::profile::{CommandKind, Profile, Timeouts};
use crate::state::StateStore;

/// Outcome of one stop-event evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// Nothing to gate: inactive scope or a re-entrant stop event.
    Allow,
    /// Supervised scope: transitions belong to the supervisor, only phase
    /// guidance flows back to the agent.
    Approve { guidance: String },
    /// The workflow is not done; the reason says what is still missing.
    Block { reason: String },
    /// Phase 4 finished with the build and all tests green.
    Complete,
}

impl StopOutcome {
    pub fn is_block(&self) -> bool {
        matches!(self, StopOutcome::Block { .. })
    }
}

/// Drives the phase state machine for one scope.
pub struct Orchestrator<'a> {
    store: &'a StateStore,
    guidance: &'a GuidanceLoader,
    profile: Option<&'a Profile>,
    timeouts: Timeouts,
    project_dir: PathBuf,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        store: &'a StateStore,
        guidance: &'a GuidanceLoader,
        profile: Option<&'a Profile>,
        timeouts: Timeouts,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            guidance,
            profile,
            timeouts,
            project_dir: project_dir.into(),
        }
    }

    /// Evaluate one stop event and advance the phase as far as the
    /// preconditions allow.
    ///
    /// `stop_hook_active` is the host's re-entrancy signal: when this stop
    /// event is the continuation of our own prior Block, do nothing, or the
    /// block/continue cycle never terminates.
    pub async fn advance(&self, stop_hook_active: bool) -> Result<StopOutcome> {
        if stop_hook_active {
            tracing::debug!("re-entrant stop event, skipping");
            return Ok(StopOutcome::Allow);
        }

        let state = self.store.load();
        if !state.active {
            return Ok(StopOutcome::Allow);
        }

        if self.store.is_supervised() {
            tracing::debug!("supervised scope, transitions handled externally");
            return Ok(StopOutcome::Approve {
                guidance: self.guidance.load_for_phase(state.phase),
            });
        }

        let compile_cmd = self.command(CommandKind::Compile);
        let test_compile_cmd = self
            .command(CommandKind::TestCompile)
            .or_else(|| self.command(CommandKind::Compile));
        let test_cmd = self.command(CommandKind::Test);

        let mut phase = state.phase;

        // Phase 1: Requirements
        if phase == 1 {
            if state.completed.requirements {
                self.store.set_phase(2)?;
                phase = 2;
                eprintln!(">>> phasegate: Phase 1 complete, advancing to Phase 2 (Interfaces)");
            } else {
                return Ok(self.block(1, phase1_block(self.store.scope_dir())));
            }
        }

        // Phase 2: Interfaces
        if phase == 2 {
            if let Some(cmd) = &compile_cmd {
                let outcome = run_command(cmd, &self.project_dir, self.timeouts.compile_secs).await;
                if !outcome.success() {
                    return Ok(self.block(2, compile_error(2, cmd, &outcome.output)));
                }
            }
            if self.store.load().completed.interfaces {
                self.store.set_phase(3)?;
                phase = 3;
                eprintln!(">>> phasegate: Phase 2 complete, advancing to Phase 3 (Tests)");
            } else {
                return Ok(self.block(2, phase2_awaiting(self.store.scope_dir())));
            }
        }

        // Phase 3: Tests
        if phase == 3 {
            if let Some(cmd) = &test_compile_cmd {
                let outcome = run_command(cmd, &self.project_dir, self.timeouts.compile_secs).await;
                if !outcome.success() {
                    return Ok(self.block(3, compile_error(3, cmd, &outcome.output)));
                }
            }
            if self.store.load().completed.tests {
                self.store.set_phase(4)?;
                phase = 4;
                eprintln!(">>> phasegate: Phase 3 complete, advancing to Phase 4 (Implementation)");
            } else {
                return Ok(self.block(3, phase3_awaiting(self.store.scope_dir())));
            }
        }

        // Phase 4: Implementation. Compile first; a broken build suppresses
        // the test run entirely.
        if phase == 4 {
            if let Some(cmd) = &compile_cmd {
                let outcome = run_command(cmd, &self.project_dir, self.timeouts.compile_secs).await;
                if !outcome.success() {
                    return Ok(self.block(4, phase4_compile_error(cmd, &outcome.output)));
                }
            }
            if let Some(cmd) = &test_cmd {
                let outcome = run_command(cmd, &self.project_dir, self.timeouts.test_secs).await;
                if !outcome.success() {
                    return Ok(self.block(4, phase4_test_failure(cmd, &outcome.output)));
                }
            }

            eprintln!(">>> phasegate: Phase 4 complete! All tests passing.");
            self.store.mark_tests_passing()?;
            self.store.clear_workflow_markers()?;
            return Ok(StopOutcome::Complete);
        }

        Ok(StopOutcome::Allow)
    }

    fn command(&self, kind: CommandKind) -> Option<String> {
        self.profile
            .and_then(|p| p.command(kind))
            .map(|s| s.to_string())
    }

    /// Build a Block, appending whatever guidance applies to the phase.
    fn block(&self, phase: u8, reason: String) -> StopOutcome {
        tracing::debug!(phase, "blocking stop event");
        let guidance = self.guidance.load_for_phase(phase);
        let reason = if guidance.is_empty() {
            reason
        } else {
            format!("{}{}", reason, guidance)
        };
        StopOutcome::Block { reason }
    }
}

fn phase1_block(scope: &Path) -> String {
    format!(
        "Phase 1 (Requirements) is not complete.\n\n\
         Discuss the requirements with the user and get explicit approval. \
         Once approved, run `phasegate confirm requirements --scope {}` to \
         advance to Phase 2 (Interfaces).",
        scope.display()
    )
}

fn compile_error(phase: u8, cmd: &str, output: &str) -> String {
    let label = match phase {
        2 => "Phase 2 (Interfaces): the interfaces do not compile.",
        _ => "Phase 3 (Tests): the tests do not compile.",
    };
    format!(
        "{}\n\nCommand: {}\n\n{}\n\nFix the compile errors before continuing.",
        label, cmd, output
    )
}

fn phase2_awaiting(scope: &Path) -> String {
    format!(
        "Phase 2 (Interfaces): interfaces compile but are not yet approved.\n\n\
         Present the interface design to the user. Once approved, run \
         `phasegate confirm interfaces --scope {}` to advance to Phase 3 (Tests).",
        scope.display()
    )
}

fn phase3_awaiting(scope: &Path) -> String {
    format!(
        "Phase 3 (Tests): tests compile but are not yet approved.\n\n\
         Present the test suite to the user. Once approved, run \
         `phasegate confirm tests --scope {}` to advance to Phase 4 (Implementation).",
        scope.display()
    )
}

fn phase4_compile_error(cmd: &str, output: &str) -> String {
    format!(
        "Phase 4 (Implementation): the build is failing.\n\nCommand: {}\n\n{}\n\n\
         Fix the build before finishing.",
        cmd, output
    )
}

fn phase4_test_failure(cmd: &str, output: &str) -> String {
    format!(
        "Phase 4 (Implementation): tests are failing.\n\nCommand: {}\n\n{}\n\n\
         Fix the implementation until every test passes.",
        cmd, output
    )
}

/// Guard against running commands from a missing or bogus project root.
pub fn usable_project_dir(cwd: &str) -> Option<&Path> {
    let path = Path::new(cwd);
    if !cwd.is_empty() && path.is_dir() {
        Some(path)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternSet;
    use crate::profile::ProfileCommands;
    use crate::state::PhaseFlag;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        store: StateStore,
        guidance: GuidanceLoader,
        profile: Profile,
        project: TempDir,
        _scope: TempDir,
    }

    fn fixture(compile: &str, test: &str) -> Fixture {
        let scope = tempdir().unwrap();
        let store = StateStore::at(scope.path().join("scope"), "test");
        store.activate(false).unwrap();
        Fixture {
            store,
            guidance: GuidanceLoader::new(scope.path().join("no-agents")),
            profile: profile(Some(compile), None, Some(test)),
            project: tempdir().unwrap(),
            _scope: scope,
        }
    }

    fn profile(compile: Option<&str>, test_compile: Option<&str>, test: Option<&str>) -> Profile {
        Profile {
            name: Some("Test".into()),
            commands: ProfileCommands {
                compile: compile.map(String::from),
                test_compile: test_compile.map(String::from),
                test: test.map(String::from),
            },
            patterns: PatternSet {
                main: vec!["src/**/*.rs".into()],
                test: vec!["tests/**/*.rs".into()],
                config: vec![],
            },
            detection: Default::default(),
        }
    }

    impl Fixture {
        fn orchestrator(&self) -> Orchestrator<'_> {
            Orchestrator::new(
                &self.store,
                &self.guidance,
                Some(&self.profile),
                Timeouts::default(),
                self.project.path(),
            )
        }
    }

    #[tokio::test]
    async fn test_reentrant_stop_event_is_noop() {
        let f = fixture("true", "true");
        let outcome = f.orchestrator().advance(true).await.unwrap();
        assert_eq!(outcome, StopOutcome::Allow);
        assert_eq!(f.store.phase(), 1);
    }

    #[tokio::test]
    async fn test_inactive_scope_allows() {
        let f = fixture("true", "true");
        f.store.clear_workflow_markers().unwrap();
        let outcome = f.orchestrator().advance(false).await.unwrap();
        assert_eq!(outcome, StopOutcome::Allow);
    }

    #[tokio::test]
    async fn test_phase1_blocks_until_requirements_confirmed() {
        let f = fixture("true", "true");
        let outcome = f.orchestrator().advance(false).await.unwrap();
        match outcome {
            StopOutcome::Block { reason } => {
                assert!(reason.contains("Phase 1"));
                assert!(reason.contains("phasegate confirm requirements"));
            }
            other => panic!("expected block, got {:?}", other),
        }
        assert_eq!(f.store.phase(), 1);
    }

    #[tokio::test]
    async fn test_phase1_falls_through_to_phase2_block() {
        let f = fixture("true", "true");
        f.store.mark_completed(PhaseFlag::Requirements).unwrap();
        let outcome = f.orchestrator().advance(false).await.unwrap();
        match outcome {
            StopOutcome::Block { reason } => assert!(reason.contains("Phase 2")),
            other => panic!("expected block, got {:?}", other),
        }
        // The transition persisted even though the stop was blocked
        assert_eq!(f.store.phase(), 2);
    }

    #[tokio::test]
    async fn test_full_fall_through_to_complete() {
        let f = fixture("true", "true");
        f.store.mark_completed(PhaseFlag::Requirements).unwrap();
        f.store.mark_completed(PhaseFlag::Interfaces).unwrap();
        f.store.mark_completed(PhaseFlag::Tests).unwrap();

        let outcome = f.orchestrator().advance(false).await.unwrap();
        assert_eq!(outcome, StopOutcome::Complete);
        assert!(f.store.tests_passing());
        // Workflow record cleared, gating off
        assert!(!f.store.is_active());
    }

    #[tokio::test]
    async fn test_phase2_compile_regression_blocks_without_regressing_phase() {
        let f = fixture("echo BUILD_BROKEN >&2; exit 1", "true");
        f.store.set_phase(2).unwrap();
        f.store.mark_completed(PhaseFlag::Interfaces).unwrap();

        let outcome = f.orchestrator().advance(false).await.unwrap();
        match outcome {
            StopOutcome::Block { reason } => {
                assert!(reason.contains("Phase 2"));
                assert!(reason.contains("BUILD_BROKEN"));
            }
            other => panic!("expected block, got {:?}", other),
        }
        assert_eq!(f.store.phase(), 2);
    }

    #[tokio::test]
    async fn test_phase3_uses_test_compile_with_compile_fallback() {
        let mut f = fixture("true", "true");
        f.profile = profile(Some("true"), Some("exit 7"), Some("true"));
        f.store.set_phase(3).unwrap();
        f.store.mark_completed(PhaseFlag::Tests).unwrap();

        let outcome = f.orchestrator().advance(false).await.unwrap();
        assert!(outcome.is_block());
        assert_eq!(f.store.phase(), 3);

        // Without a distinct test-compile command the compile command stands in
        f.profile = profile(Some("true"), None, Some("true"));
        let outcome = f.orchestrator().advance(false).await.unwrap();
        assert_eq!(outcome, StopOutcome::Complete);
    }

    #[tokio::test]
    async fn test_phase4_compile_failure_suppresses_test_run() {
        let f = fixture("exit 1", "touch ran-tests");
        f.store.set_phase(4).unwrap();

        let outcome = f.orchestrator().advance(false).await.unwrap();
        assert!(outcome.is_block());
        assert!(!f.project.path().join("ran-tests").exists());
    }

    #[tokio::test]
    async fn test_phase4_test_failure_reports_output() {
        let f = fixture("true", "echo 'FAILED: 2 tests'; exit 1");
        f.store.set_phase(4).unwrap();

        let outcome = f.orchestrator().advance(false).await.unwrap();
        match outcome {
            StopOutcome::Block { reason } => {
                assert!(reason.contains("Phase 4"));
                assert!(reason.contains("FAILED: 2 tests"));
            }
            other => panic!("expected block, got {:?}", other),
        }
        assert_eq!(f.store.phase(), 4);
        assert!(!f.store.tests_passing());
    }

    #[tokio::test]
    async fn test_missing_profile_advances_on_flags_alone() {
        let f = fixture("true", "true");
        f.store.mark_completed(PhaseFlag::Requirements).unwrap();
        f.store.mark_completed(PhaseFlag::Interfaces).unwrap();
        f.store.mark_completed(PhaseFlag::Tests).unwrap();

        let orch = Orchestrator::new(
            &f.store,
            &f.guidance,
            None,
            Timeouts::default(),
            f.project.path(),
        );
        let outcome = orch.advance(false).await.unwrap();
        assert_eq!(outcome, StopOutcome::Complete);
    }

    #[tokio::test]
    async fn test_supervised_scope_approves_with_guidance_only() {
        let scope = tempdir().unwrap();
        let store = StateStore::at(scope.path().join("scope"), "test");
        store.activate(true).unwrap();
        store.set_phase(2).unwrap();

        let agents_dir = scope.path().join("agents");
        std::fs::create_dir_all(&agents_dir).unwrap();
        std::fs::write(
            agents_dir.join("designer.md"),
            "---\nname: designer\nphases: [2]\n---\nKeep interfaces small.\n",
        )
        .unwrap();

        let guidance = GuidanceLoader::new(&agents_dir);
        let profile = profile(Some("exit 1"), None, Some("exit 1"));
        let project = tempdir().unwrap();
        let orch = Orchestrator::new(
            &store,
            &guidance,
            Some(&profile),
            Timeouts::default(),
            project.path(),
        );

        // Failing commands are irrelevant: no checks run in supervised mode
        let outcome = orch.advance(false).await.unwrap();
        match outcome {
            StopOutcome::Approve { guidance } => {
                assert!(guidance.contains("Keep interfaces small."));
            }
            other => panic!("expected approve, got {:?}", other),
        }
        assert_eq!(store.phase(), 2);
    }

    #[tokio::test]
    async fn test_block_appends_phase_guidance() {
        let scope = tempdir().unwrap();
        let store = StateStore::at(scope.path().join("scope"), "test");
        store.activate(false).unwrap();

        let agents_dir = scope.path().join("agents");
        std::fs::create_dir_all(&agents_dir).unwrap();
        std::fs::write(
            agents_dir.join("requirements.md"),
            "---\nname: requirements\nphases: [1]\n---\nAsk questions first.\n",
        )
        .unwrap();

        let guidance = GuidanceLoader::new(&agents_dir);
        let profile = profile(Some("true"), None, Some("true"));
        let project = tempdir().unwrap();
        let orch = Orchestrator::new(
            &store,
            &guidance,
            Some(&profile),
            Timeouts::default(),
            project.path(),
        );

        match orch.advance(false).await.unwrap() {
            StopOutcome::Block { reason } => {
                assert!(reason.contains("Phase 1"));
                assert!(reason.contains("Ask questions first."));
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_advance_is_idempotent_for_identical_conditions() {
        let f = fixture("true", "echo failing; exit 1");
        f.store.set_phase(4).unwrap();

        let first = f.orchestrator().advance(false).await.unwrap();
        let second = f.orchestrator().advance(false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(f.store.phase(), 4);
    }

    #[test]
    fn test_usable_project_dir() {
        let dir = tempdir().unwrap();
        assert!(usable_project_dir(dir.path().to_str().unwrap()).is_some());
        assert!(usable_project_dir("").is_none());
        assert!(usable_project_dir("/nonexistent/project/dir").is_none());
    }
}
