//! Delegation types: a leader-initiated subtask and its outcome.

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// A parsed `@delegate(Agent, "task")` command.
///
/// Transient: lives for one turn only. The target is a display name; the
/// engine resolves it against the registry at dispatch time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delegation {
    /// Target agent display name, as written by the model.
    pub agent: String,
    /// The task text.
    pub task: String,
}

impl Delegation {
    /// Construct a delegation.
    pub fn new(agent: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            task: task.into(),
        }
    }
}

/// Outcome of one awaited delegation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationResult {
    /// Resolved target id. Empty when the target was never found.
    pub agent_id: AgentId,
    /// Target display name.
    pub agent_name: String,
    /// The delegated task text.
    pub task: String,
    /// Response text on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Error text on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DelegationResult {
    /// A successful delegation outcome.
    pub fn ok(
        agent_id: AgentId,
        agent_name: impl Into<String>,
        task: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            agent_id,
            agent_name: agent_name.into(),
            task: task.into(),
            response: Some(response.into()),
            error: None,
        }
    }

    /// A failed delegation outcome.
    pub fn err(
        agent_id: AgentId,
        agent_name: impl Into<String>,
        task: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            agent_id,
            agent_name: agent_name.into(),
            task: task.into(),
            response: None,
            error: Some(error.into()),
        }
    }

    /// Whether the delegation failed.
    #[must_use]
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}
