//! Tool execution errors.
//!
//! These are internal seam errors; the dispatcher folds every one of them
//! into a failed [`ToolResult`](hive_core::ToolResult) rather than
//! propagating, keeping tool execution total.

use thiserror::Error;

/// Error from a tool-internal operation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A path escaped the project root or a command was blocked.
    #[error("{message}")]
    Containment {
        /// The exact user-visible message.
        message: String,
    },

    /// Filesystem operation failed.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// What was being attempted.
        operation: &'static str,
        /// The path involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Subprocess handling failed.
    #[error("{message}")]
    Process {
        /// Error description.
        message: String,
    },
}

impl ToolError {
    /// A containment violation with the canonical traversal message.
    #[must_use]
    pub fn traversal() -> Self {
        Self::Containment {
            message: "path traversal not allowed".into(),
        }
    }
}
