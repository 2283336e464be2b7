//! Glob pattern compilation and file classification.
//!
//! Profiles describe their source layout with glob patterns. This module
//! compiles those globs to regexes and classifies edited paths as main
//! source, test source, and/or config. A path may match more than one
//! category; callers decide what that means for the active phase.
//!
//! Glob semantics:
//! - `**/` matches zero or more leading path segments
//! - a bare `**` matches any remaining characters, including `/`
//! - `*` matches any run of characters except `/`
//! - `?` matches a single character except `/`
//! - everything else is literal
//!
//! Patterns are not anchored to the start of the path: `*.ts` matches
//! `src/deep/file.ts`.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    inner: MatcherKind,
}

#[derive(Debug, Clone)]
enum MatcherKind {
    Regex(Regex),
    /// Fallback when the generated regex does not compile: the pattern is
    /// matched as literal text (never as match-everything).
    Literal(String),
}

impl GlobMatcher {
    /// Compile a glob pattern. Never fails: an unparseable pattern degrades
    /// to literal-text matching.
    pub fn compile(pattern: &str) -> Self {
        let regex_src = glob_to_regex(pattern);
        match Regex::new(&regex_src) {
            Ok(re) => Self {
                inner: MatcherKind::Regex(re),
            },
            Err(_) => Self {
                inner: MatcherKind::Literal(pattern.to_string()),
            },
        }
    }

    /// Check whether a path matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match &self.inner {
            MatcherKind::Regex(re) => re.is_match(path),
            MatcherKind::Literal(lit) => {
                path == lit || path.ends_with(&format!("/{}", lit))
            }
        }
    }
}

/// Convert a glob pattern to an anchored regex source string.
///
/// The pattern always gets an implicit optional leading-directories prefix,
/// so `src/*.rs` matches both `src/a.rs` and `work/src/a.rs`.
pub fn glob_to_regex(pattern: &str) -> String {
    let escaped = regex::escape(pattern);

    // regex::escape turns `*` into `\*` and `?` into `\?`; substitute the
    // glob constructs back in via placeholders so `**` is handled before `*`.
    let body = escaped
        .replace(r"\*\*", "\u{0}")
        .replace(r"\*", "\u{1}")
        .replace(r"\?", "\u{2}")
        .replace("\u{0}/", "(?:.*/)?")
        .replace('\u{0}', ".*")
        .replace('\u{1}', "[^/]*")
        .replace('\u{2}', "[^/]");

    format!("^(?:.*/)?{}$", body)
}

/// Check whether a path matches any pattern in the list.
///
/// Short-circuits on the first match.
pub fn matches_any(path: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|p| GlobMatcher::compile(p).matches(path))
}

/// The three pattern lists a profile supplies for classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSet {
    #[serde(default)]
    pub main: Vec<String>,
    #[serde(default)]
    pub test: Vec<String>,
    #[serde(default)]
    pub config: Vec<String>,
}

/// How a path classifies against a profile's pattern set.
///
/// The categories are not exclusive: a test file can legitimately match
/// both the main and test lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub is_main: bool,
    pub is_test: bool,
    pub is_config: bool,
}

impl Classification {
    pub fn is_source(&self) -> bool {
        self.is_main || self.is_test
    }
}

/// Classify a path against a profile's pattern set.
pub fn classify(path: &str, patterns: &PatternSet) -> Classification {
    Classification {
        is_main: matches_any(path, &patterns.main),
        is_test: matches_any(path, &patterns.test),
        is_config: matches_any(path, &patterns.config),
    }
}
