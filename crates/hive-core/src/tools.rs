//! Tool vocabulary: the fixed set of tools an agent may invoke against its
//! bound project, plus the call/result types that flow through the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// ToolName
// ─────────────────────────────────────────────────────────────────────────────

/// The fixed tool vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Read a file and return its content.
    ReadFile,
    /// Write a file, creating parent directories.
    WriteFile,
    /// Append to a file, inserting a newline separator when needed.
    AppendFile,
    /// List a directory, dirs first, dotfiles omitted.
    ListDir,
    /// Case-insensitive substring search across files matching a glob.
    SearchFiles,
    /// Execute a shell command inside the project root.
    RunCommand,
    /// Signal a structured error report back to the caller. No side effect.
    ReportError,
}

impl ToolName {
    /// All tool names, in documentation order.
    pub const ALL: [Self; 7] = [
        Self::ReadFile,
        Self::WriteFile,
        Self::AppendFile,
        Self::ListDir,
        Self::SearchFiles,
        Self::RunCommand,
        Self::ReportError,
    ];

    /// The wire-format name (`read_file`, `run_command`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadFile => "read_file",
            Self::WriteFile => "write_file",
            Self::AppendFile => "append_file",
            Self::ListDir => "list_dir",
            Self::SearchFiles => "search_files",
            Self::RunCommand => "run_command",
            Self::ReportError => "report_error",
        }
    }

    /// Parse a wire-format name. Unknown names yield `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "read_file" => Some(Self::ReadFile),
            "write_file" => Some(Self::WriteFile),
            "append_file" => Some(Self::AppendFile),
            "list_dir" => Some(Self::ListDir),
            "search_files" => Some(Self::SearchFiles),
            "run_command" => Some(Self::RunCommand),
            "report_error" => Some(Self::ReportError),
            _ => None,
        }
    }

    /// Number of positional arguments this tool takes.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Self::WriteFile | Self::AppendFile | Self::SearchFiles => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ToolCall / ToolResult
// ─────────────────────────────────────────────────────────────────────────────

/// A single tool invocation extracted from model output.
///
/// Transient: lives for one turn only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Which tool to run.
    pub tool: ToolName,
    /// Positional argument vector.
    pub args: Vec<String>,
}

impl ToolCall {
    /// Construct a call from a tool and its positional args.
    pub fn new(tool: ToolName, args: Vec<String>) -> Self {
        Self { tool, args }
    }

    /// Serialise back to the documented inline `@tool(args)` form.
    ///
    /// Two-argument file tools use the triple-quote convention so that
    /// re-parsing the output yields the identical call.
    #[must_use]
    pub fn to_inline(&self) -> String {
        let empty = String::new();
        let first = self.args.first().unwrap_or(&empty);
        match self.tool {
            ToolName::WriteFile | ToolName::AppendFile => {
                let content = self.args.get(1).unwrap_or(&empty);
                format!("@{}({first}, \"\"\"{content}\"\"\")", self.tool)
            }
            ToolName::SearchFiles => {
                let query = self.args.get(1).unwrap_or(&empty);
                format!("@{}({first}, {query})", self.tool)
            }
            _ => format!("@{}({first})", self.tool),
        }
    }
}

/// Outcome of executing one [`ToolCall`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// The tool that ran.
    pub tool: ToolName,
    /// The arguments it ran with.
    pub args: Vec<String>,
    /// Whether the tool itself succeeded. A non-zero command exit is still
    /// a success; only tool-internal errors clear this flag.
    pub success: bool,
    /// Result text when `success` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Error text when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Distinguishes a `report_error` signal from a real failure.
    #[serde(default)]
    pub is_error_report: bool,
    /// Whether the result text was truncated to the output cap.
    #[serde(default)]
    pub truncated: bool,
    /// Tool-specific metadata (sizes, exit codes, durations).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful result.
    pub fn ok(call: &ToolCall, result: impl Into<String>) -> Self {
        Self {
            tool: call.tool,
            args: call.args.clone(),
            success: true,
            result: Some(result.into()),
            error: None,
            is_error_report: false,
            truncated: false,
            details: None,
        }
    }

    /// A failed result.
    pub fn fail(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            tool: call.tool,
            args: call.args.clone(),
            success: false,
            result: None,
            error: Some(error.into()),
            is_error_report: false,
            truncated: false,
            details: None,
        }
    }

    /// An annotated `report_error` result. Success, but flagged.
    pub fn report(call: &ToolCall, description: impl Into<String>) -> Self {
        Self {
            tool: call.tool,
            args: call.args.clone(),
            success: true,
            result: Some(description.into()),
            error: None,
            is_error_report: true,
            truncated: false,
            details: None,
        }
    }

    /// Mark the result text as truncated.
    #[must_use]
    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    /// Attach tool-specific metadata.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
