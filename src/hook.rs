//! Host hook protocol: parse the action event, emit the decision.
//!
//! The host delivers one JSON event on stdin per hook invocation and reads
//! an optional JSON decision from stdout. No stdout output means implicit
//! allow, so everything human-facing goes to stderr.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Read;

/// The action event as delivered by the host.
///
/// Every field has a safe default: a hook must never fail on a malformed
/// or partial event, it just sees less context.
#[derive(Debug, Clone, Deserialize)]
pub struct HookEvent {
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default)]
    pub cwd: String,
    #[serde(default = "default_session_id")]
    pub session_id: String,
    /// True when this stop event is a continuation of our own prior block.
    #[serde(default)]
    pub stop_hook_active: bool,
    #[serde(default)]
    pub hook_event_name: String,
}

fn default_session_id() -> String {
    "unknown".to_string()
}

impl Default for HookEvent {
    fn default() -> Self {
        Self {
            tool_name: String::new(),
            tool_input: Value::default(),
            cwd: String::new(),
            session_id: default_session_id(),
            stop_hook_active: false,
            hook_event_name: String::new(),
        }
    }
}

impl HookEvent {
    /// Parse an event from a reader. Unparsable input yields the default
    /// event rather than an error.
    pub fn from_reader(mut reader: impl Read) -> Self {
        let mut buf = String::new();
        if reader.read_to_string(&mut buf).is_err() {
            return Self::default();
        }
        serde_json::from_str(&buf).unwrap_or_default()
    }

    /// The edited file path, when the tool input carries one.
    pub fn file_path(&self) -> Option<&str> {
        self.tool_input
            .get("file_path")
            .and_then(|v| v.as_str())
            .filter(|p| !p.is_empty())
    }

    /// Whether this event is a file-edit tool invocation.
    pub fn is_edit_tool(&self) -> bool {
        matches!(self.tool_name.as_str(), "Write" | "Edit")
    }
}

/// Decision payload written back to the host.
#[derive(Debug, Clone, Serialize)]
pub struct HookResponse {
    pub decision: &'static str,
    pub reason: String,
    #[serde(rename = "hookSpecificOutput", skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HookSpecificOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(rename = "additionalContext")]
    pub additional_context: String,
}

impl HookResponse {
    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            decision: "block",
            reason: reason.into(),
            hook_specific_output: None,
        }
    }

    /// Approve while still surfacing diagnostic context (e.g. a compile
    /// failure after an allowed edit).
    pub fn approve_with_context(
        reason: impl Into<String>,
        event_name: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            decision: "approve",
            reason: reason.into(),
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: event_name.into(),
                additional_context: context.into(),
            }),
        }
    }

    /// Print the decision to stdout for the host.
    pub fn emit(&self) {
        // Serialization of this shape cannot fail; fall back to silence
        // (implicit allow) rather than crashing the hook.
        if let Ok(json) = serde_json::to_string_pretty(self) {
            println!("{}", json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_event() {
        let input = r#"{
            "tool_name": "Edit",
            "tool_input": {"file_path": "src/main.rs"},
            "cwd": "/work/project",
            "session_id": "abc123",
            "stop_hook_active": true,
            "hook_event_name": "Stop"
        }"#;
        let event = HookEvent::from_reader(input.as_bytes());
        assert_eq!(event.tool_name, "Edit");
        assert_eq!(event.file_path(), Some("src/main.rs"));
        assert_eq!(event.cwd, "/work/project");
        assert_eq!(event.session_id, "abc123");
        assert!(event.stop_hook_active);
        assert!(event.is_edit_tool());
    }

    #[test]
    fn test_parse_malformed_event_defaults() {
        let event = HookEvent::from_reader("not json at all".as_bytes());
        assert_eq!(event.session_id, "unknown");
        assert_eq!(event.file_path(), None);
        assert!(!event.stop_hook_active);
        assert!(!event.is_edit_tool());
    }

    #[test]
    fn test_parse_empty_event() {
        let event = HookEvent::from_reader("{}".as_bytes());
        assert_eq!(event.session_id, "unknown");
        assert!(!event.is_edit_tool());
    }

    #[test]
    fn test_file_path_missing_or_empty() {
        let event = HookEvent::from_reader(
            r#"{"tool_name": "Write", "tool_input": {"file_path": ""}}"#.as_bytes(),
        );
        assert_eq!(event.file_path(), None);

        let event = HookEvent::from_reader(r#"{"tool_name": "Write"}"#.as_bytes());
        assert_eq!(event.file_path(), None);
    }

    #[test]
    fn test_block_response_shape() {
        let resp = HookResponse::block("Phase 1: no code yet");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"decision\":\"block\""));
        assert!(json.contains("Phase 1: no code yet"));
        assert!(!json.contains("hookSpecificOutput"));
    }

    #[test]
    fn test_approve_with_context_shape() {
        let resp = HookResponse::approve_with_context("compile failed", "PostToolUse", "error X");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"decision\":\"approve\""));
        assert!(json.contains("\"hookEventName\":\"PostToolUse\""));
        assert!(json.contains("error X"));
    }
}
