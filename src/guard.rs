//! Phase policy for file edits.
//!
//! One decision per proposed edit, derived from the scope's current phase
//! and the active profile's pattern classification:
//!
//! | Phase | Blocked |
//! |-------|---------------------------------------------|
//! | 1     | any main or test source                     |
//! | 2     | test source                                 |
//! | 3     | main source that is not also test or config |
//! | 4     | nothing                                     |
//!
//! Phase 3 deliberately resolves ambiguous classification (main AND test)
//! in favor of allowing the edit.

use crate::patterns::classify;
use crate::profile::Profile;
use crate::state::WorkflowState;

/// A proposed file edit.
#[derive(Debug, Clone)]
pub struct EditRequest<'a> {
    pub path: &'a str,
}

/// The guard's verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow,
    Block { reason: String },
}

impl Decision {
    pub fn is_block(&self) -> bool {
        matches!(self, Decision::Block { .. })
    }
}

/// Evaluate a single proposed edit.
///
/// `guidance` is opaque phase-specific text appended verbatim to any block
/// reason; pass an empty string when the loader found nothing.
pub fn evaluate(
    edit: &EditRequest<'_>,
    state: &WorkflowState,
    profile: Option<&Profile>,
    guidance: &str,
) -> Decision {
    if !state.active {
        return Decision::Allow;
    }

    // No profile resolved: nothing to classify against, let it through.
    let Some(profile) = profile else {
        return Decision::Allow;
    };

    let c = classify(edit.path, &profile.patterns);

    let blocked = match state.phase {
        1 => c.is_main || c.is_test,
        2 => c.is_test,
        3 => c.is_main && !c.is_test && !c.is_config,
        _ => false,
    };

    if !blocked {
        return Decision::Allow;
    }

    let reason = match state.phase {
        1 => format!(
            "Phase 1 (Requirements): cannot edit source files while gathering requirements ({})",
            edit.path
        ),
        2 => format!(
            "Phase 2 (Interfaces): cannot write tests during interface design ({})",
            edit.path
        ),
        _ => format!(
            "Phase 3 (Tests): cannot edit implementation during test writing ({})",
            edit.path
        ),
    };

    let reason = if guidance.is_empty() {
        reason
    } else {
        format!("{}{}", reason, guidance)
    };

    Decision::Block { reason }
}
