//! One conversational session against the external agent CLI.
//!
//! Each turn spawns `claude --print --output-format stream-json --verbose`
//! with the prompt on stdin and parses the stream-json events from stdout.
//! The first turn establishes a session id; later turns pass
//! `--resume <id>` so the conversation continues instead of starting over.

use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::Command;

use crate::errors::SupervisorError;

/// How the agent CLI is invoked.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub command: String,
    /// Per-turn timeout; an expired turn keeps whatever text arrived.
    pub turn_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            turn_timeout_secs: 300,
        }
    }
}

/// Events from the agent CLI's stream-json output. Unknown event and block
/// types are tolerated and skipped.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "assistant")]
    Assistant {
        message: AssistantMessage,
        #[serde(default)]
        session_id: String,
    },

    #[serde(rename = "system")]
    System {
        #[serde(default)]
        session_id: String,
    },

    #[serde(rename = "result")]
    Result {
        #[serde(default)]
        session_id: String,
    },
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(other)]
    Other,
}

/// Everything one turn produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnResult {
    pub text: String,
    pub marker_found: bool,
}

#[derive(Default)]
struct Collected {
    text: String,
    session_id: Option<String>,
    marker_found: bool,
}

/// A resumable conversation with the agent CLI.
pub struct AgentSession {
    config: AgentConfig,
    working_dir: PathBuf,
    env: Vec<(String, String)>,
    session_id: Option<String>,
}

impl AgentSession {
    pub fn new(
        config: AgentConfig,
        working_dir: impl Into<PathBuf>,
        env: Vec<(String, String)>,
    ) -> Self {
        Self {
            config,
            working_dir: working_dir.into(),
            env,
            session_id: None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Run one turn: send the prompt, stream the response, scan for the
    /// completion marker. When `echo` is set, assistant text is mirrored to
    /// stdout as it arrives.
    pub async fn turn(
        &mut self,
        prompt: &str,
        marker: &str,
        echo: bool,
    ) -> Result<TurnResult, SupervisorError> {
        let mut cmd = Command::new(&self.config.command);
        cmd.arg("--print")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose");
        if let Some(id) = &self.session_id {
            cmd.arg("--resume").arg(id);
        }
        // stderr inherits so agent-side errors stay visible in the terminal
        cmd.current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| SupervisorError::AgentSpawnFailed {
            command: self.config.command.clone(),
            source: e,
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .context("Failed to write prompt to agent stdin")?;
            stdin
                .shutdown()
                .await
                .context("Failed to close agent stdin")?;
        }

        let stdout = child.stdout.take().context("Failed to take agent stdout")?;
        let mut lines = BufReader::new(stdout).lines();

        let mut collected = Collected::default();
        let deadline = Duration::from_secs(self.config.turn_timeout_secs);
        let finished = tokio::time::timeout(
            deadline,
            collect_stream(&mut lines, marker, echo, &mut collected),
        )
        .await;

        match finished {
            Ok(()) => {
                let _ = child.wait().await;
            }
            Err(_) => {
                // Abandon the turn and keep the partial text
                tracing::warn!(timeout_secs = self.config.turn_timeout_secs, "agent turn timed out");
                eprintln!(
                    ">>> phasegate: agent turn timed out after {}s",
                    self.config.turn_timeout_secs
                );
                let _ = child.kill().await;
            }
        }

        if let Some(id) = collected.session_id.take() {
            self.session_id = Some(id);
        }

        Ok(TurnResult {
            text: collected.text,
            marker_found: collected.marker_found,
        })
    }
}

/// Drain the stream-json events, accumulating into `out` so a timeout still
/// observes the partial result.
async fn collect_stream<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    marker: &str,
    echo: bool,
    out: &mut Collected,
) {
    use std::io::Write;

    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(event) = serde_json::from_str::<StreamEvent>(&line) else {
            continue;
        };
        let session_id = match event {
            StreamEvent::Assistant { message, session_id } => {
                for block in message.content {
                    if let ContentBlock::Text { text } = block {
                        if echo {
                            print!("{}", text);
                            let _ = std::io::stdout().flush();
                        }
                        if text.contains(marker) {
                            out.marker_found = true;
                        }
                        out.text.push_str(&text);
                    }
                }
                session_id
            }
            StreamEvent::System { session_id } | StreamEvent::Result { session_id } => session_id,
        };
        if !session_id.is_empty() {
            out.session_id = Some(session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::tempdir;

    /// A stand-in agent: logs its args, swallows stdin, then emits the
    /// given stream-json lines.
    fn fake_agent(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-agent");
        let script = format!(
            "#!/bin/sh\necho \"$@\" >> {}/args.log\ncat > /dev/null\n{}\n",
            dir.display(),
            body
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn config(command: String, timeout: u64) -> AgentConfig {
        AgentConfig {
            command,
            turn_timeout_secs: timeout,
        }
    }

    #[tokio::test]
    async fn test_turn_collects_text_and_detects_marker() {
        let dir = tempdir().unwrap();
        let agent = fake_agent(
            dir.path(),
            r#"echo '{"type":"system","session_id":"sess-1"}'
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"All set. PHASE_COMPLETE"}]},"session_id":"sess-1"}'"#,
        );

        let mut session = AgentSession::new(config(agent, 30), dir.path(), vec![]);
        let result = session.turn("prompt", "PHASE_COMPLETE", false).await.unwrap();

        assert!(result.marker_found);
        assert!(result.text.contains("All set."));
        assert_eq!(session.session_id(), Some("sess-1"));
    }

    #[tokio::test]
    async fn test_second_turn_resumes_session() {
        let dir = tempdir().unwrap();
        let agent = fake_agent(
            dir.path(),
            r#"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"ok"}]},"session_id":"sess-9"}'"#,
        );

        let mut session = AgentSession::new(config(agent, 30), dir.path(), vec![]);
        session.turn("first", "NEVER", false).await.unwrap();
        session.turn("second", "NEVER", false).await.unwrap();

        let log = fs::read_to_string(dir.path().join("args.log")).unwrap();
        let calls: Vec<&str> = log.lines().collect();
        assert_eq!(calls.len(), 2);
        assert!(!calls[0].contains("--resume"));
        assert!(calls[1].contains("--resume sess-9"));
    }

    #[tokio::test]
    async fn test_unparsable_and_unknown_events_are_skipped() {
        let dir = tempdir().unwrap();
        let agent = fake_agent(
            dir.path(),
            r#"echo 'not json'
echo '{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Bash"},{"type":"text","text":"after tool"}]},"session_id":""}'"#,
        );

        let mut session = AgentSession::new(config(agent, 30), dir.path(), vec![]);
        let result = session.turn("prompt", "NEVER", false).await.unwrap();
        assert_eq!(result.text, "after tool");
        assert!(!result.marker_found);
        // Empty session ids never overwrite
        assert_eq!(session.session_id(), None);
    }

    #[tokio::test]
    async fn test_timed_out_turn_keeps_partial_text() {
        let dir = tempdir().unwrap();
        let agent = fake_agent(
            dir.path(),
            r#"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"partial"}]},"session_id":"sess-2"}'
sleep 30"#,
        );

        let mut session = AgentSession::new(config(agent, 1), dir.path(), vec![]);
        let result = session.turn("prompt", "NEVER", false).await.unwrap();
        assert_eq!(result.text, "partial");
        assert_eq!(session.session_id(), Some("sess-2"));
    }

    #[tokio::test]
    async fn test_missing_agent_binary_is_spawn_error() {
        let dir = tempdir().unwrap();
        let mut session = AgentSession::new(
            config("/nonexistent/agent-binary".into(), 5),
            dir.path(),
            vec![],
        );
        let err = session.turn("prompt", "NEVER", false).await.unwrap_err();
        assert!(matches!(err, SupervisorError::AgentSpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_env_vars_reach_the_agent() {
        let dir = tempdir().unwrap();
        let agent = fake_agent(
            dir.path(),
            r#"printf '{"type":"assistant","message":{"content":[{"type":"text","text":"%s"}]},"session_id":""}\n' "$PHASEGATE_WORKFLOW_ID""#,
        );

        let mut session = AgentSession::new(
            config(agent, 30),
            dir.path(),
            vec![("PHASEGATE_WORKFLOW_ID".into(), "wf-42".into())],
        );
        let result = session.turn("prompt", "NEVER", false).await.unwrap();
        assert_eq!(result.text, "wf-42");
    }
}
