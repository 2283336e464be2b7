//! Phase-bound guidance documents.
//!
//! Guidance lives as markdown files with a YAML-ish frontmatter header
//! declaring which phases it applies to:
//!
//! ```markdown
//! ---
//! name: tdd-tester
//! phases: [3]
//! ---
//! Write tests before implementation...
//! ```
//!
//! `load_for_phase` concatenates the bodies of every applicable document.
//! A missing directory or unreadable file degrades to no guidance, never
//! an error: guidance sweetens a block reason, it never decides one.

use std::path::{Path, PathBuf};

/// Environment override for the guidance directory.
pub const AGENTS_DIR_ENV: &str = "PHASEGATE_AGENTS_DIR";

/// Parsed frontmatter of one guidance document.
#[derive(Debug, Clone, Default, PartialEq)]
struct Frontmatter {
    name: Option<String>,
    phases: Vec<u8>,
}

/// Loads guidance documents for a phase.
pub struct GuidanceLoader {
    agents_dir: PathBuf,
}

impl GuidanceLoader {
    pub fn new(agents_dir: impl Into<PathBuf>) -> Self {
        Self {
            agents_dir: agents_dir.into(),
        }
    }

    /// Loader rooted at the default location, honoring the env override.
    pub fn from_env() -> Self {
        let dir = std::env::var(AGENTS_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".phasegate")
                    .join("agents")
            });
        Self::new(dir)
    }

    /// Combined guidance text for a phase, or empty when none applies.
    pub fn load_for_phase(&self, phase: u8) -> String {
        let Ok(entries) = std::fs::read_dir(&self.agents_dir) else {
            return String::new();
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "md").unwrap_or(false))
            .collect();
        files.sort();

        let mut combined = String::new();
        for path in files {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let fm = parse_frontmatter(&content);
            if !fm.phases.contains(&phase) {
                continue;
            }
            let body = strip_frontmatter(&content);
            if body.trim().is_empty() {
                continue;
            }
            let name = fm
                .name
                .unwrap_or_else(|| display_name_from_path(&path));
            tracing::debug!(agent = %name, phase, "loading guidance document");
            combined.push_str(&format!("\n\n---\n\n## Agent: {}\n\n{}", name, body));
        }
        combined
    }
}

/// Parse the minimal frontmatter fields we care about (`name:`, `phases:`).
fn parse_frontmatter(content: &str) -> Frontmatter {
    let Some(header) = frontmatter_block(content) else {
        return Frontmatter::default();
    };

    let mut fm = Frontmatter::default();
    for line in header.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("name:") {
            let name = rest.trim();
            if !name.is_empty() {
                fm.name = Some(name.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("phases:") {
            let rest = rest.trim();
            if let Some(inner) = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                fm.phases = inner
                    .split(',')
                    .filter_map(|p| p.trim().parse::<u8>().ok())
                    .collect();
            }
        }
    }
    fm
}

/// The text between the opening and closing `---` delimiters, if present.
fn frontmatter_block(content: &str) -> Option<&str> {
    let rest = content.strip_prefix("---")?;
    let end = rest.find("\n---")?;
    Some(&rest[..end])
}

/// Document body with the frontmatter removed.
fn strip_frontmatter(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("---") else {
        return content;
    };
    let Some(end) = rest.find("\n---") else {
        return content;
    };
    let after = &rest[end + 4..];
    after.strip_prefix('\n').unwrap_or(after)
}

/// `tdd-tester.md` → `Tdd Tester`
fn display_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    stem.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const TESTER_DOC: &str = "---\nname: tdd-tester\nphases: [3]\n---\nWrite the tests first.\n";
    const DESIGNER_DOC: &str = "---\nphases: [2, 3]\n---\nKeep interfaces small.\n";

    #[test]
    fn test_parse_frontmatter_fields() {
        let fm = parse_frontmatter(TESTER_DOC);
        assert_eq!(fm.name.as_deref(), Some("tdd-tester"));
        assert_eq!(fm.phases, vec![3]);
    }

    #[test]
    fn test_parse_frontmatter_missing_returns_default() {
        assert_eq!(parse_frontmatter("No frontmatter here"), Frontmatter::default());
        // Unclosed frontmatter is also ignored
        assert_eq!(
            parse_frontmatter("---\nname: x\nphases: [1]"),
            Frontmatter::default()
        );
    }

    #[test]
    fn test_strip_frontmatter() {
        assert_eq!(strip_frontmatter(TESTER_DOC), "Write the tests first.\n");
        assert_eq!(strip_frontmatter("plain body"), "plain body");
    }

    #[test]
    fn test_load_for_phase_combines_applicable_docs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("designer.md"), DESIGNER_DOC).unwrap();
        fs::write(dir.path().join("tester.md"), TESTER_DOC).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loader = GuidanceLoader::new(dir.path());

        let phase3 = loader.load_for_phase(3);
        assert!(phase3.contains("## Agent: tdd-tester"));
        assert!(phase3.contains("Write the tests first."));
        assert!(phase3.contains("Keep interfaces small."));
        // No explicit name: derived from the filename
        assert!(phase3.contains("## Agent: Designer"));

        let phase2 = loader.load_for_phase(2);
        assert!(phase2.contains("Keep interfaces small."));
        assert!(!phase2.contains("Write the tests first."));

        assert_eq!(loader.load_for_phase(1), "");
    }

    #[test]
    fn test_load_for_phase_missing_dir_is_empty() {
        let loader = GuidanceLoader::new("/nonexistent/agents/dir");
        assert_eq!(loader.load_for_phase(1), "");
    }

    #[test]
    fn test_display_name_from_path() {
        assert_eq!(
            display_name_from_path(Path::new("/x/tdd-tester.md")),
            "Tdd Tester"
        );
    }
}
