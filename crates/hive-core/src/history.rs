//! Conversation history entries with provenance tags.
//!
//! Every entry carries a [`Provenance`] tag telling where it came from. The
//! tag is authoritative: consumers never infer provenance from content
//! prefixes like `[TOOL RESULTS]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::delegation::DelegationResult;
use crate::tools::ToolResult;

/// Speaker role of a history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User (or engine-constructed continuation) message.
    User,
    /// Assistant output.
    Assistant,
}

/// Where a history entry came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Provenance {
    /// A message typed by the user, or plain assistant output.
    Plain,
    /// An engine-constructed `[TOOL RESULTS]` continuation.
    ToolResult {
        /// The structured results the continuation was rendered from.
        results: Vec<ToolResult>,
    },
    /// An engine-constructed `[DELEGATION RESULTS]` continuation.
    DelegationResult {
        /// The structured outcomes the continuation was rendered from.
        results: Vec<DelegationResult>,
    },
    /// A `[TASK from ...]` handoff delivered to a delegation target.
    DelegationTask {
        /// Display name of the originating leader.
        from: String,
    },
}

impl Provenance {
    /// Whether this entry is an engine-constructed continuation of the
    /// same agent's turn (as opposed to a fresh turn trigger).
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        matches!(self, Self::ToolResult { .. } | Self::DelegationResult { .. })
    }
}

impl Default for Provenance {
    fn default() -> Self {
        Self::Plain
    }
}

/// One entry in an agent's conversation history. Append-only, except via
/// the explicit clear and truncate operations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Speaker role.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Append time.
    pub timestamp: DateTime<Utc>,
    /// Authoritative provenance tag.
    #[serde(default)]
    pub provenance: Provenance,
}

impl HistoryEntry {
    /// A plain entry with the current timestamp.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            provenance: Provenance::Plain,
        }
    }

    /// An entry with an explicit provenance tag.
    pub fn tagged(role: Role, content: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            provenance,
        }
    }
}
