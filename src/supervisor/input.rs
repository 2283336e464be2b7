//! Human input for the supervised loop.
//!
//! A paste arrives as a burst of lines; reading line-by-line would send each
//! line as its own agent turn. `read_multiline` blocks for the first line,
//! then keeps draining lines that arrive within a short window so the whole
//! paste is consumed as one unit.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// How long to wait for further lines of the same paste.
const DRAIN_WINDOW: Duration = Duration::from_millis(50);

/// An interpreted line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    /// Free text, forwarded to the agent as a continuation turn.
    Text(String),
    /// `/done`, `/complete`, `/next`: force the phase complete.
    Complete,
    /// `/quit`, `/exit`, `/abort`: controlled cancellation.
    Abort,
    /// `/file <path>`: send the file's contents as the next turn.
    LoadFile(PathBuf),
}

/// Classify raw input into a command or plain text. Empty input is `Text("")`;
/// callers skip it.
pub fn interpret(raw: &str) -> UserInput {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "/done" | "/complete" | "/next" => return UserInput::Complete,
        "/quit" | "/exit" | "/abort" => return UserInput::Abort,
        _ => {}
    }
    if let Some(path) = trimmed.strip_prefix("/file ") {
        let path = path.trim();
        if !path.is_empty() {
            return UserInput::LoadFile(PathBuf::from(path));
        }
    }
    UserInput::Text(trimmed.to_string())
}

/// The long-lived stdin reader for one supervised run.
pub type StdinLines = Lines<BufReader<tokio::io::Stdin>>;

pub fn stdin_lines() -> StdinLines {
    BufReader::new(tokio::io::stdin()).lines()
}

/// Read one logical input, coalescing a multi-line paste. Returns None on
/// EOF.
///
/// The caller holds the `Lines` reader for the whole run. A fresh reader
/// per call would lose input: the drain window can expire with a partial
/// line (a paste without a trailing newline) sitting in the buffer, and
/// dropping the reader discards those bytes from the fd.
pub async fn read_multiline<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    prompt: &str,
) -> Option<String> {
    if !prompt.is_empty() {
        eprint!("{}", prompt);
        let _ = std::io::stderr().flush();
    }
    drain_lines(lines, DRAIN_WINDOW).await
}

/// The coalescing core, generic so it is testable against a buffer: block on
/// the first line, then keep taking lines until none arrives within `window`.
/// `next_line` is cancel safe, so a line the window interrupts mid-read stays
/// buffered for the next call.
pub async fn drain_lines<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    window: Duration,
) -> Option<String> {
    let first = lines.next_line().await.ok().flatten()?;
    let mut collected = vec![first];

    loop {
        match tokio::time::timeout(window, lines.next_line()).await {
            Ok(Ok(Some(line))) => collected.push(line),
            // EOF, read error or window elapsed: the paste is over
            _ => break,
        }
    }

    Some(collected.join("\n"))
}
