//! Kernel error hierarchy.
//!
//! `ProviderTransient` never appears here: the adapter absorbs it through
//! retries. `Cancelled` is deliberately distinct from failure — the engine
//! exits with status idle, not error.

use hive_core::ids::AgentId;
use hive_llm::provider::ProviderError;
use hive_tools::errors::ToolError;
use thiserror::Error;

/// Top-level error for kernel operations.
#[derive(Debug, Error)]
pub enum SwarmError {
    /// A record (agent, todo, document) does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind.
        kind: &'static str,
        /// Offending id.
        id: String,
    },

    /// The request was malformed (missing field, invalid patch).
    #[error("bad request: {message}")]
    BadRequest {
        /// What was wrong.
        message: String,
    },

    /// A fatal provider failure, surfaced verbatim after retries.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A tool-internal failure that escaped the dispatcher.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The user stopped the turn.
    #[error("stopped by user")]
    Cancelled,

    /// Persistence collaborator failure.
    #[error("persistence error: {message}")]
    Persistence {
        /// What failed.
        message: String,
    },

    /// Anything without a better home.
    #[error("{message}")]
    Internal {
        /// Error description.
        message: String,
    },
}

impl SwarmError {
    /// Agent lookup failure.
    #[must_use]
    pub fn agent_not_found(id: &AgentId) -> Self {
        Self::NotFound {
            kind: "agent",
            id: id.to_string(),
        }
    }

    /// Todo lookup failure.
    pub fn todo_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "todo",
            id: id.into(),
        }
    }

    /// A bad-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// An internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
