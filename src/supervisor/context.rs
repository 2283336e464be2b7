//! Prompt templates and marker protocol for supervised phases.
//!
//! Each phase opens with a fixed instruction template; phases 2-4 embed the
//! summaries persisted by earlier phases. The agent signals readiness by
//! emitting the literal completion marker in its response text. Summary
//! self-review uses its own pair of markers interpreted by the leading line.

/// Emitted by the agent when it considers the current phase done.
pub const PHASE_COMPLETE: &str = "PHASE_COMPLETE";
/// Review response: the summary was complete as generated.
pub const SUMMARY_VERIFIED: &str = "SUMMARY_VERIFIED";
/// Review response: the summary missed items; corrected text follows.
pub const GAPS_FOUND: &str = "GAPS_FOUND";

pub fn phase_name(phase: u8) -> &'static str {
    match phase {
        1 => "Requirements Gathering",
        2 => "Interface Design",
        3 => "Test Writing",
        _ => "Implementation",
    }
}

/// The opening prompt for a phase, with prior-phase summaries interpolated.
pub fn phase_context(
    phase: u8,
    task: Option<&str>,
    requirements: &str,
    interfaces: &str,
    tests: &str,
) -> String {
    match phase {
        1 => phase1_context(task),
        2 => phase2_context(requirements),
        3 => phase3_context(requirements, interfaces),
        _ => phase4_context(requirements, interfaces, tests),
    }
}

fn phase1_context(task: Option<&str>) -> String {
    let task_section = match task {
        Some(task) => format!("\n## Initial Task\nThe user wants to build:\n{}\n", task),
        None => String::new(),
    };
    format!(
        "# TDD Workflow - Phase 1: Requirements Gathering\n\n\
         You are in Phase 1 of the TDD workflow. Your goal is a complete,\n\
         unambiguous understanding of what needs to be built.\n\
         {}\n\
         ## Your Task\n\
         1. Understand what the user wants to build\n\
         2. Ask clarifying questions about behavior, edge cases, error\n\
            handling, input/output formats, and constraints\n\
         3. Summarize the requirements back to the user\n\
         4. Get explicit confirmation that the requirements are complete\n\n\
         ## Important\n\
         - Do NOT write any code in this phase\n\
         - Do NOT design interfaces yet\n\
         - Focus entirely on WHAT, not HOW\n\
         - When requirements are confirmed, say \"{}\" to signal you're ready\n\n\
         Begin by asking the user what they want to build (if not already provided).\n",
        task_section, PHASE_COMPLETE
    )
}

fn phase2_context(requirements: &str) -> String {
    format!(
        "# TDD Workflow - Phase 2: Interface Design\n\n\
         You are in Phase 2 of the TDD workflow. Your goal is the structural\n\
         skeleton of the solution, without any business logic.\n\n\
         ## Requirements from Phase 1\n{}\n\n\
         ## Your Task\n\
         1. Design type and function signatures for the public API\n\
         2. Create stubs that compile but are not implemented\n\
         3. Ensure the code compiles/type-checks successfully\n\
         4. Get user approval on the interface design\n\n\
         ## Important\n\
         - Do NOT implement business logic; bodies are stubs only\n\
         - The code MUST compile\n\
         - When interfaces are approved, say \"{}\" to signal you're ready\n",
        requirements, PHASE_COMPLETE
    )
}

fn phase3_context(requirements: &str, interfaces: &str) -> String {
    format!(
        "# TDD Workflow - Phase 3: Test Writing\n\n\
         You are in Phase 3 of the TDD workflow. Your goal is tests that\n\
         define the expected behavior (the red phase of TDD).\n\n\
         ## Requirements from Phase 1\n{}\n\n\
         ## Interfaces from Phase 2\n{}\n\n\
         ## Your Task\n\
         1. Write tests covering the happy path, edge cases, error scenarios\n\
            and boundary conditions from the requirements\n\
         2. Tests must compile but FAIL when run (they test stubs)\n\
         3. Get user approval on test coverage\n\n\
         ## Important\n\
         - Do NOT implement the actual code yet\n\
         - Each requirement should have at least one test\n\
         - When tests are approved, say \"{}\" to signal you're ready\n",
        requirements, interfaces, PHASE_COMPLETE
    )
}

fn phase4_context(requirements: &str, interfaces: &str, tests: &str) -> String {
    format!(
        "# TDD Workflow - Phase 4: Implementation\n\n\
         You are in Phase 4 of the TDD workflow. Your goal is to implement\n\
         the business logic until every test passes (the green phase).\n\n\
         ## Requirements Summary\n{}\n\n\
         ## Interfaces Created\n{}\n\n\
         ## Tests to Pass\n{}\n\n\
         ## Your Task\n\
         1. Read the test files to understand the expected behavior\n\
         2. Implement the logic piece by piece, running tests frequently\n\
         3. Continue until ALL tests pass\n\n\
         ## Important\n\
         - The tests are your specification; make them pass\n\
         - If a test seems wrong, discuss it with the user before changing it\n\
         - When ALL tests pass, the workflow is complete\n",
        requirements, interfaces, tests
    )
}

/// Summary generation prompt for phases 1-3; phase 4 has no summary step.
pub fn summary_prompt(phase: u8) -> Option<&'static str> {
    match phase {
        1 => Some(
            "Before we move to the next phase, create a concise requirements summary.\n\n\
             Output ONLY the summary in this exact format (no other text):\n\n\
             # Requirements Summary\n\n\
             ## Purpose\n[One sentence describing what this feature does]\n\n\
             ## Functional Requirements\n- [Requirement]\n\n\
             ## Edge Cases & Error Handling\n- [Edge case]\n\n\
             ## Constraints & Decisions\n- [Constraint or decision made]\n\n\
             Keep it concise - it will be passed to the next phase as context.",
        ),
        2 => Some(
            "Before we move to testing, list the interfaces you created.\n\n\
             Output ONLY the list in this exact format (no other text):\n\n\
             # Interfaces Created\n\n\
             ## Types/Modules\n- `Name` - [brief purpose]\n\n\
             ## Key Functions\n- `name(params)` - [brief purpose]\n\n\
             Keep it concise - it will be passed to the next phase as context.",
        ),
        3 => Some(
            "Before we move to implementation, list the tests you created.\n\n\
             Output ONLY the list in this exact format (no other text):\n\n\
             # Tests Created\n\n\
             ## Test Files\n- `file name`\n\n\
             ## Test Cases\n- `test_name` - [what it verifies]\n\n\
             ## Coverage Notes\n- Happy path / edge cases / error scenarios covered\n\n\
             Keep it concise - it will be passed to the implementation phase.",
        ),
        _ => None,
    }
}

/// Self-review prompt for a freshly generated summary.
pub fn review_prompt(phase: u8) -> Option<String> {
    if !(1..=3).contains(&phase) {
        return None;
    }
    Some(format!(
        "Review the summary you just produced against everything discussed in \
         this phase.\n\n\
         If anything is missing or wrong, respond with `{}` on the first line, \
         followed by the complete corrected summary.\n\
         If it is complete, respond with `{}` on the first line, followed by \
         the summary unchanged.",
        GAPS_FOUND, SUMMARY_VERIFIED
    ))
}

/// Interpret a self-review response by its leading marker.
///
/// Both markers keep the text after the marker line; a marker with nothing
/// after it falls back to the initial summary, and an unrecognized response
/// is used verbatim (the agent may have re-emitted the summary directly).
pub fn resolve_review(initial: &str, review: &str) -> String {
    for marker in [GAPS_FOUND, SUMMARY_VERIFIED] {
        if review.starts_with(marker) {
            return match review.split_once('\n') {
                Some((_, rest)) if !rest.trim().is_empty() => rest.trim().to_string(),
                _ => initial.to_string(),
            };
        }
    }
    if review.trim().is_empty() {
        initial.to_string()
    } else {
        review.to_string()
    }
}
