//! Shell command execution with a blocklist, timeout, and output caps.
//!
//! Commands run through `bash -c` with cwd = project root. The blocklist is
//! checked before any process is spawned; a match never reaches a shell.

use std::sync::LazyLock;
use std::time::Instant;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::ToolError;

/// Blocklist patterns, matched case-insensitively. Static and compiled in.
const BLOCKLIST_PATTERNS: [&str; 8] = [
    r"rm\s+-rf",
    r"rm\s+.*\/",
    r"curl.*\|.*sh",
    r"wget.*\|.*sh",
    r">\s*\/dev",
    r"dd\s+if=",
    r"mkfs",
    r"format",
];

static BLOCKLIST: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    BLOCKLIST_PATTERNS
        .iter()
        .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
        .collect()
});

/// Whether a command matches any blocklist pattern.
#[must_use]
pub fn is_blocked(command: &str) -> bool {
    BLOCKLIST.iter().any(|regex| regex.is_match(command))
}

// ─────────────────────────────────────────────────────────────────────────────
// ProcessRunner
// ─────────────────────────────────────────────────────────────────────────────

/// Options for one subprocess run.
#[derive(Clone, Debug)]
pub struct ProcessOptions {
    /// Working directory.
    pub working_directory: String,
    /// Wall-clock timeout in milliseconds.
    pub timeout_ms: u64,
    /// Cancellation token for cooperative abort.
    pub cancellation: CancellationToken,
}

/// Captured output of a subprocess.
#[derive(Clone, Debug)]
pub struct ProcessOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code (`-1` when unavailable).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the timeout fired.
    pub timed_out: bool,
    /// Whether cancellation fired.
    pub interrupted: bool,
}

/// Subprocess execution seam, so tests can script outputs.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a shell command.
    async fn run_command(
        &self,
        command: &str,
        opts: &ProcessOptions,
    ) -> Result<ProcessOutput, ToolError>;
}

/// Real subprocess execution backed by `tokio::process::Command`.
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run_command(
        &self,
        command: &str,
        opts: &ProcessOptions,
    ) -> Result<ProcessOutput, ToolError> {
        let start = Instant::now();

        let mut cmd = tokio::process::Command::new("bash");
        let _ = cmd
            .arg("-c")
            .arg(command)
            .current_dir(&opts.working_directory)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        debug!(command, working_dir = %opts.working_directory, "spawning process");

        let child = cmd.spawn().map_err(|e| ToolError::Process {
            message: format!("Failed to spawn process: {e}"),
        })?;

        let timeout = std::time::Duration::from_millis(opts.timeout_ms);
        let cancel = opts.cancellation.clone();

        let output = tokio::select! {
            result = child.wait_with_output() => {
                result.map_err(|e| ToolError::Process {
                    message: format!("Process wait failed: {e}"),
                })?
            }
            () = tokio::time::sleep(timeout) => {
                warn!(command, timeout_ms = opts.timeout_ms, "process timed out");
                return Ok(ProcessOutput {
                    stdout: String::new(),
                    stderr: "Process timed out".into(),
                    exit_code: -1,
                    duration_ms: elapsed_ms(start),
                    timed_out: true,
                    interrupted: false,
                });
            }
            () = cancel.cancelled() => {
                debug!(command, "process cancelled");
                return Ok(ProcessOutput {
                    stdout: String::new(),
                    stderr: "Process cancelled".into(),
                    exit_code: -1,
                    duration_ms: elapsed_ms(start),
                    timed_out: false,
                    interrupted: true,
                });
            }
        };

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            duration_ms: elapsed_ms(start),
            timed_out: false,
            interrupted: false,
        })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Truncate a string to at most `max` bytes on a char boundary.
#[must_use]
pub fn truncate_output(text: &str, max: usize) -> (String, bool) {
    if text.len() <= max {
        return (text.to_owned(), false);
    }
    let mut cut = max;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    (text[..cut].to_owned(), true)
}
