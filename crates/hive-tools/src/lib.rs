//! # hive-tools
//!
//! Tool-call parsing and sandboxed tool execution against a project root.
//!
//! - [`parser`] extracts [`ToolCall`]s from free-form model output: JSON
//!   `<tool_call>` blocks and inline `@tool(...)` invocations, in one pass.
//! - [`path`] enforces the containment boundary: every path argument must
//!   resolve inside the project root.
//! - [`shell`] runs commands through `bash -c` behind a blocklist, a
//!   wall-clock timeout, and output caps.
//! - [`dispatcher`] executes one call and always yields a [`ToolResult`] —
//!   only tool-internal errors (filesystem failures, timeouts, containment
//!   violations) count as failures.
//!
//! [`ToolCall`]: hive_core::ToolCall
//! [`ToolResult`]: hive_core::ToolResult

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod errors;
pub mod fs;
pub mod parser;
pub mod path;
pub mod search;
pub mod shell;

pub use dispatcher::{DispatcherConfig, ToolDispatcher};
pub use errors::ToolError;
pub use parser::parse_tool_calls;
pub use shell::{ProcessOptions, ProcessOutput, ProcessRunner, TokioProcessRunner};
