//! Technology profile configuration.
//!
//! Profiles supply the compile/test command strings and the file-pattern
//! lists the guard and orchestrator consume. They live in a single TOML
//! file, loaded once and validated up front:
//!
//! ```toml
//! [profiles.rust-cargo]
//! name = "Rust (cargo)"
//!
//! [profiles.rust-cargo.commands]
//! compile = "cargo check"
//! test = "cargo test"
//!
//! [profiles.rust-cargo.patterns]
//! main = ["src/**/*.rs"]
//! test = ["tests/**/*.rs", "src/**/*_test.rs"]
//! config = ["Cargo.toml"]
//!
//! [profiles.rust-cargo.detection]
//! files = ["Cargo.toml"]
//! patterns = ["*.rs"]
//!
//! [timeouts]
//! compile_secs = 120
//! test_secs = 300
//! ```
//!
//! An override file (`override.toml` with `active_profile = "..."`) beats
//! auto-detection. Detection scores each profile: +10 per marker file
//! present in the project directory, +1 if any project file matches a
//! detection source pattern; the highest score wins.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::patterns::{GlobMatcher, PatternSet};

/// Which external command class a phase requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Compile,
    TestCompile,
    Test,
}

/// Command strings for a profile. All optional: a missing command means
/// "nothing to check here".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileCommands {
    #[serde(default)]
    pub compile: Option<String>,
    #[serde(default)]
    pub test_compile: Option<String>,
    #[serde(default)]
    pub test: Option<String>,
}

/// Marker files and source patterns used to auto-detect a profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDetection {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// One technology profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Human-readable name shown in block reasons.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub commands: ProfileCommands,
    #[serde(default)]
    pub patterns: PatternSet,
    #[serde(default)]
    pub detection: ProfileDetection,
}

impl Profile {
    /// Look up a command string. `TestCompile` intentionally has no
    /// fallback here; the orchestrator decides whether to reuse `compile`.
    pub fn command(&self, kind: CommandKind) -> Option<&str> {
        match kind {
            CommandKind::Compile => self.commands.compile.as_deref(),
            CommandKind::TestCompile => self.commands.test_compile.as_deref(),
            CommandKind::Test => self.commands.test.as_deref(),
        }
    }

    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(id)
    }
}

/// External command timeouts, seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_compile_secs")]
    pub compile_secs: u64,
    #[serde(default = "default_test_secs")]
    pub test_secs: u64,
}

fn default_compile_secs() -> u64 {
    120
}

fn default_test_secs() -> u64 {
    300
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            compile_secs: default_compile_secs(),
            test_secs: default_test_secs(),
        }
    }
}

/// The full profiles file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Override file contents: `active_profile = "rust-cargo"`.
#[derive(Debug, Deserialize)]
struct OverrideFile {
    #[serde(default)]
    active_profile: Option<String>,
}

impl ProfileConfig {
    /// Load and validate the profiles file. An invalid profile fails fast
    /// rather than resolving to nothing later.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profiles file: {}", path.display()))?;
        let config: ProfileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse profiles TOML: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, returning an empty config when the
    /// file does not exist (no profiles means nothing is ever gated by
    /// classification).
    pub fn load_or_default() -> Result<Self> {
        let path = default_profiles_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        for (id, profile) in &self.profiles {
            if profile.patterns.main.is_empty() {
                bail!("Profile '{}' has no main source patterns", id);
            }
            if profile.patterns.test.is_empty() {
                bail!("Profile '{}' has no test source patterns", id);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.profiles.get(id)
    }

    /// Resolve the active profile for a project directory.
    ///
    /// The override file wins; otherwise profiles are scored against the
    /// project tree. Returns None when nothing matches.
    pub fn resolve_active(&self, project_dir: &Path) -> Option<(&str, &Profile)> {
        if let Some(id) = read_override(&default_override_path())
            && let Some((key, profile)) = self.profiles.get_key_value(&id)
        {
            return Some((key.as_str(), profile));
        }
        self.detect(project_dir)
    }

    /// Score-based auto-detection.
    fn detect(&self, project_dir: &Path) -> Option<(&str, &Profile)> {
        let mut best: Option<(&str, &Profile, u32)> = None;

        for (id, profile) in &self.profiles {
            let mut score = 0u32;

            for marker in &profile.detection.files {
                if project_dir.join(marker).exists() {
                    score += 10;
                }
            }

            for pattern in &profile.detection.patterns {
                if any_file_matches(project_dir, pattern) {
                    score += 1;
                }
            }

            if score > 0 && best.map(|(_, _, s)| score > s).unwrap_or(true) {
                best = Some((id.as_str(), profile, score));
            }
        }

        best.map(|(id, profile, _)| (id, profile))
    }
}

/// Whether any file under the project directory matches the glob pattern.
/// Stops at the first hit.
fn any_file_matches(project_dir: &Path, pattern: &str) -> bool {
    let matcher = GlobMatcher::compile(pattern);
    WalkDir::new(project_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .any(|e| {
            e.path()
                .strip_prefix(project_dir)
                .ok()
                .map(|rel| matcher.matches(&rel.to_string_lossy()))
                .unwrap_or(false)
        })
}

fn read_override(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let parsed: OverrideFile = toml::from_str(&content).ok()?;
    parsed.active_profile.filter(|p| !p.is_empty())
}

/// `~/.phasegate/profiles.toml`
pub fn default_profiles_path() -> PathBuf {
    config_dir().join("profiles.toml")
}

/// `~/.phasegate/override.toml`
pub fn default_override_path() -> PathBuf {
    config_dir().join("override.toml")
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".phasegate")
}
