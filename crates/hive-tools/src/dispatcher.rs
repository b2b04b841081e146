//! The tool dispatcher: executes one [`ToolCall`] against a project root.
//!
//! Dispatch is total — every call yields a [`ToolResult`]. Only
//! tool-internal errors (filesystem failures, timeouts, containment
//! violations) come back with `success = false`; a non-zero command exit is
//! a success carrying the combined stdout/stderr.

use std::path::Path;
use std::sync::Arc;

use hive_core::tools::{ToolCall, ToolName, ToolResult};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::ToolError;
use crate::fs;
use crate::path::contain;
use crate::search::{search_files, SearchLimits};
use crate::shell::{
    is_blocked, truncate_output, ProcessOptions, ProcessRunner, TokioProcessRunner,
};

/// Message for a blocked command. Exact wording is part of the contract.
const BLOCKED_MESSAGE: &str = "Command blocked for security reasons";
/// Message for an unreadable project root.
const NOT_ACCESSIBLE_MESSAGE: &str = "project path not accessible";

/// Dispatcher limits.
#[derive(Clone, Copy, Debug)]
pub struct DispatcherConfig {
    /// `run_command` wall-clock timeout in milliseconds.
    pub command_timeout_ms: u64,
    /// Cap on the result text returned to the model, in bytes.
    pub output_cap_bytes: usize,
    /// Cap on the raw captured output buffer, in bytes.
    pub buffer_cap_bytes: usize,
    /// `search_files` limits.
    pub search: SearchLimits,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 30_000,
            output_cap_bytes: 10_000,
            buffer_cap_bytes: 1024 * 1024,
            search: SearchLimits::default(),
        }
    }
}

/// Executes tool calls inside a project root.
pub struct ToolDispatcher {
    runner: Arc<dyn ProcessRunner>,
    config: DispatcherConfig,
}

impl Default for ToolDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolDispatcher {
    /// A dispatcher backed by the real process runner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            runner: Arc::new(TokioProcessRunner),
            config: DispatcherConfig::default(),
        }
    }

    /// Substitute the process runner (tests).
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Override the limits.
    #[must_use]
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute one call. Always returns a [`ToolResult`].
    pub async fn dispatch(
        &self,
        root: &Path,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> ToolResult {
        debug!(tool = %call.tool, args = ?call.args, root = %root.display(), "dispatching tool");

        // The root must exist and be readable before any tool runs.
        match std::fs::metadata(root) {
            Ok(meta) if meta.is_dir() => {}
            _ => return ToolResult::fail(call, NOT_ACCESSIBLE_MESSAGE),
        }

        match self.execute(root, call, cancel).await {
            Ok(result) => result,
            Err(e) => ToolResult::fail(call, e.to_string()),
        }
    }

    async fn execute(
        &self,
        root: &Path,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        match call.tool {
            ToolName::ReadFile => {
                let path = contain(root, arg(call, 0)?)?;
                let (content, size) = fs::read_file(&path).await?;
                let (text, truncated) = truncate_output(&content, self.config.output_cap_bytes);
                Ok(ToolResult::ok(call, text)
                    .with_truncated(truncated)
                    .with_details(json!({ "sizeBytes": size })))
            }
            ToolName::WriteFile => {
                let path = contain(root, arg(call, 0)?)?;
                let bytes = fs::write_file(&path, arg(call, 1)?).await?;
                Ok(
                    ToolResult::ok(call, format!("Wrote {bytes} bytes to {}", arg(call, 0)?))
                        .with_details(json!({ "bytesWritten": bytes })),
                )
            }
            ToolName::AppendFile => {
                let path = contain(root, arg(call, 0)?)?;
                let bytes = fs::append_file(&path, arg(call, 1)?).await?;
                Ok(ToolResult::ok(
                    call,
                    format!("Appended {bytes} bytes to {}", arg(call, 0)?),
                )
                .with_details(json!({ "bytesAppended": bytes })))
            }
            ToolName::ListDir => {
                let path = contain(root, arg(call, 0)?)?;
                let listing = fs::list_dir(&path).await?;
                Ok(ToolResult::ok(call, listing))
            }
            ToolName::SearchFiles => {
                let result =
                    search_files(root, arg(call, 0)?, arg(call, 1)?, self.config.search).await?;
                let (text, truncated) = truncate_output(&result, self.config.output_cap_bytes);
                Ok(ToolResult::ok(call, text).with_truncated(truncated))
            }
            ToolName::RunCommand => self.run_command(root, call, arg(call, 0)?, cancel).await,
            ToolName::ReportError => Ok(ToolResult::report(call, arg(call, 0)?)),
        }
    }

    async fn run_command(
        &self,
        root: &Path,
        call: &ToolCall,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        if is_blocked(command) {
            return Ok(ToolResult::fail(call, BLOCKED_MESSAGE));
        }

        let opts = ProcessOptions {
            working_directory: root.display().to_string(),
            timeout_ms: self.config.command_timeout_ms,
            cancellation: cancel.clone(),
        };
        let output = self.runner.run_command(command, &opts).await?;

        if output.timed_out {
            return Ok(ToolResult::fail(
                call,
                format!(
                    "Command timed out after {} seconds",
                    self.config.command_timeout_ms / 1000
                ),
            ));
        }
        if output.interrupted {
            return Ok(ToolResult::fail(call, "Command cancelled"));
        }

        let mut combined = output.stdout;
        if !output.stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(&output.stderr);
        }

        // Guard the raw buffer first, then apply the model-facing cap.
        let (buffered, buffer_truncated) =
            truncate_output(&combined, self.config.buffer_cap_bytes);
        let (text, output_truncated) =
            truncate_output(&buffered, self.config.output_cap_bytes);
        let truncated = buffer_truncated || output_truncated;

        Ok(ToolResult::ok(call, text)
            .with_truncated(truncated)
            .with_details(json!({
                "exitCode": output.exit_code,
                "durationMs": output.duration_ms,
                "truncated": truncated,
            })))
    }
}

/// Positional argument lookup with a uniform missing-argument error.
fn arg(call: &ToolCall, index: usize) -> Result<&str, ToolError> {
    call.args
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| ToolError::Process {
            message: format!("missing argument {} for {}", index + 1, call.tool),
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ProcessOutput;
    use async_trait::async_trait;

    struct ScriptedRunner {
        stdout: String,
        stderr: String,
        exit_code: i32,
    }

    #[async_trait]
    impl ProcessRunner for ScriptedRunner {
        async fn run_command(
            &self,
            _command: &str,
            _opts: &ProcessOptions,
        ) -> Result<ProcessOutput, ToolError> {
            Ok(ProcessOutput {
                stdout: self.stdout.clone(),
                stderr: self.stderr.clone(),
                exit_code: self.exit_code,
                duration_ms: 5,
                timed_out: false,
                interrupted: false,
            })
        }
    }

    fn call(tool: ToolName, args: &[&str]) -> ToolCall {
        ToolCall::new(tool, args.iter().map(|s| (*s).to_owned()).collect())
    }

    fn cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn missing_root_is_not_accessible() {
        let dispatcher = ToolDispatcher::new();
        let result = dispatcher
            .dispatch(
                Path::new("/nonexistent/project"),
                &call(ToolName::ListDir, &["."]),
                &cancel(),
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("project path not accessible"));
    }

    #[tokio::test]
    async fn read_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = ToolDispatcher::new();

        let written = dispatcher
            .dispatch(
                dir.path(),
                &call(ToolName::WriteFile, &["notes/today.md", "remember the milk"]),
                &cancel(),
            )
            .await;
        assert!(written.success, "{written:?}");
        assert_eq!(
            written.result.as_deref(),
            Some("Wrote 17 bytes to notes/today.md")
        );

        let read = dispatcher
            .dispatch(
                dir.path(),
                &call(ToolName::ReadFile, &["notes/today.md"]),
                &cancel(),
            )
            .await;
        assert!(read.success);
        assert_eq!(read.result.as_deref(), Some("remember the milk"));
        assert_eq!(read.details.as_ref().unwrap()["sizeBytes"], 17);
    }

    #[tokio::test]
    async fn traversal_is_rejected_with_exact_message() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = ToolDispatcher::new();
        let result = dispatcher
            .dispatch(
                dir.path(),
                &call(ToolName::ReadFile, &["../../etc/passwd"]),
                &cancel(),
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("path traversal not allowed"));
    }

    #[tokio::test]
    async fn blocked_command_never_reaches_a_shell() {
        struct PanickingRunner;
        #[async_trait]
        impl ProcessRunner for PanickingRunner {
            async fn run_command(
                &self,
                _command: &str,
                _opts: &ProcessOptions,
            ) -> Result<ProcessOutput, ToolError> {
                panic!("shell must not be invoked for blocked commands");
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let dispatcher = ToolDispatcher::new().with_runner(Arc::new(PanickingRunner));
        let result = dispatcher
            .dispatch(
                dir.path(),
                &call(ToolName::RunCommand, &["rm -rf /"]),
                &cancel(),
            )
            .await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Command blocked for security reasons")
        );
    }

    #[tokio::test]
    async fn nonzero_exit_is_still_success() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = ToolDispatcher::new().with_runner(Arc::new(ScriptedRunner {
            stdout: "partial".into(),
            stderr: "boom".into(),
            exit_code: 2,
        }));
        let result = dispatcher
            .dispatch(
                dir.path(),
                &call(ToolName::RunCommand, &["false"]),
                &cancel(),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.result.as_deref(), Some("partial\nboom"));
        assert_eq!(result.details.as_ref().unwrap()["exitCode"], 2);
    }

    #[tokio::test]
    async fn oversized_output_is_truncated_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = ToolDispatcher::new().with_runner(Arc::new(ScriptedRunner {
            stdout: "x".repeat(50_000),
            stderr: String::new(),
            exit_code: 0,
        }));
        let result = dispatcher
            .dispatch(
                dir.path(),
                &call(ToolName::RunCommand, &["yes | head -c 50000"]),
                &cancel(),
            )
            .await;
        assert!(result.success);
        assert!(result.truncated);
        assert_eq!(result.result.as_ref().unwrap().len(), 10_000);
        assert_eq!(result.details.as_ref().unwrap()["truncated"], true);
    }

    #[tokio::test]
    async fn search_with_zero_matches_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "hello").await.unwrap();
        let dispatcher = ToolDispatcher::new();
        let result = dispatcher
            .dispatch(
                dir.path(),
                &call(ToolName::SearchFiles, &["*.txt", "absent"]),
                &cancel(),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.result.as_deref(), Some("No matches found"));
    }

    #[tokio::test]
    async fn report_error_is_flagged_success() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = ToolDispatcher::new();
        let result = dispatcher
            .dispatch(
                dir.path(),
                &call(ToolName::ReportError, &["Missing dependency X"]),
                &cancel(),
            )
            .await;
        assert!(result.success);
        assert!(result.is_error_report);
        assert_eq!(result.result.as_deref(), Some("Missing dependency X"));
    }

    #[tokio::test]
    async fn missing_argument_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = ToolDispatcher::new();
        let result = dispatcher
            .dispatch(dir.path(), &call(ToolName::WriteFile, &["only-path"]), &cancel())
            .await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("missing argument 2"));
    }
}
