//! Swarm events and the broadcast bus that fans them out.
//!
//! The bus is publish-only and non-blocking for publishers: a slow
//! subscriber lags and drops events rather than stalling the engine.
//! Delivery is best-effort, FIFO per subscriber.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::agent::{AgentStatus, SanitizedAgent};
use crate::ids::AgentId;
use crate::tools::ToolName;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

// ─────────────────────────────────────────────────────────────────────────────
// SwarmEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Every observable state transition in the swarm.
///
/// Serialises with a `kind` discriminant matching the realtime-channel
/// event names, so the transport can republish events verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
#[allow(clippy::large_enum_variant)]
pub enum SwarmEvent {
    /// A new agent record exists.
    #[serde(rename = "agent:created")]
    AgentCreated {
        /// Sanitised record (no credential).
        agent: SanitizedAgent,
    },
    /// An agent record was updated.
    #[serde(rename = "agent:updated")]
    AgentUpdated {
        /// Sanitised record (no credential).
        agent: SanitizedAgent,
    },
    /// An agent record was deleted.
    #[serde(rename = "agent:deleted")]
    AgentDeleted {
        /// Sanitised record (no credential).
        agent: SanitizedAgent,
    },
    /// An agent's runtime status changed.
    #[serde(rename = "agent:status")]
    AgentStatus {
        /// Agent id.
        id: AgentId,
        /// New status.
        status: AgentStatus,
    },
    /// The in-flight output buffer changed.
    #[serde(rename = "agent:thinking")]
    AgentThinking {
        /// Agent id.
        id: AgentId,
        /// Accumulated buffer.
        thinking: String,
    },
    /// A model stream opened.
    #[serde(rename = "agent:stream:start")]
    StreamStart {
        /// Agent id.
        id: AgentId,
    },
    /// A text chunk arrived.
    #[serde(rename = "agent:stream:chunk")]
    StreamChunk {
        /// Agent id.
        id: AgentId,
        /// The delta text.
        chunk: String,
    },
    /// The model stream closed normally.
    #[serde(rename = "agent:stream:end")]
    StreamEnd {
        /// Agent id.
        id: AgentId,
    },
    /// The model stream failed.
    #[serde(rename = "agent:stream:error")]
    StreamError {
        /// Agent id.
        id: AgentId,
        /// Human-readable message.
        error: String,
    },
    /// A tool is about to run.
    #[serde(rename = "agent:tool:start")]
    ToolStart {
        /// Agent id.
        id: AgentId,
        /// Agent display name.
        name: String,
        /// The tool.
        tool: ToolName,
        /// Its arguments.
        args: Vec<String>,
    },
    /// A tool succeeded.
    #[serde(rename = "agent:tool:result")]
    ToolResult {
        /// Agent id.
        id: AgentId,
        /// Agent display name.
        name: String,
        /// The tool.
        tool: ToolName,
        /// Its arguments.
        args: Vec<String>,
        /// Truncated preview of the result text.
        preview: String,
    },
    /// A tool failed.
    #[serde(rename = "agent:tool:error")]
    ToolError {
        /// Agent id.
        id: AgentId,
        /// Agent display name.
        name: String,
        /// The tool.
        tool: ToolName,
        /// Its arguments.
        args: Vec<String>,
        /// Error text.
        error: String,
    },
    /// A leader dispatched a delegation.
    #[serde(rename = "agent:delegation")]
    Delegation {
        /// Leader id.
        from_id: AgentId,
        /// Leader display name.
        from_name: String,
        /// Target id.
        to_id: AgentId,
        /// Target display name.
        to_name: String,
        /// Delegated task text.
        task: String,
    },
    /// An agent reported being blocked via `report_error`.
    #[serde(rename = "agent:error:report")]
    ErrorReport {
        /// Agent id.
        id: AgentId,
        /// Agent display name.
        name: String,
        /// What went wrong, in the agent's words.
        description: String,
        /// Report time.
        timestamp: DateTime<Utc>,
    },
    /// A turn was stopped by the user.
    #[serde(rename = "agent:stopped")]
    Stopped {
        /// Agent id.
        id: AgentId,
        /// Agent display name.
        name: String,
    },
    /// A scripted cross-agent context transfer.
    #[serde(rename = "agent:handoff")]
    Handoff {
        /// Source id.
        from_id: AgentId,
        /// Source display name.
        from_name: String,
        /// Target id.
        to_id: AgentId,
        /// Target display name.
        to_name: String,
    },
}

impl SwarmEvent {
    /// The event kind discriminant, as republished on the realtime channel.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AgentCreated { .. } => "agent:created",
            Self::AgentUpdated { .. } => "agent:updated",
            Self::AgentDeleted { .. } => "agent:deleted",
            Self::AgentStatus { .. } => "agent:status",
            Self::AgentThinking { .. } => "agent:thinking",
            Self::StreamStart { .. } => "agent:stream:start",
            Self::StreamChunk { .. } => "agent:stream:chunk",
            Self::StreamEnd { .. } => "agent:stream:end",
            Self::StreamError { .. } => "agent:stream:error",
            Self::ToolStart { .. } => "agent:tool:start",
            Self::ToolResult { .. } => "agent:tool:result",
            Self::ToolError { .. } => "agent:tool:error",
            Self::Delegation { .. } => "agent:delegation",
            Self::ErrorReport { .. } => "agent:error:report",
            Self::Stopped { .. } => "agent:stopped",
            Self::Handoff { .. } => "agent:handoff",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventBus
// ─────────────────────────────────────────────────────────────────────────────

/// Multi-producer, multi-subscriber event fan-out.
///
/// `publish` never awaits. With no subscribers it is a no-op.
pub struct EventBus {
    tx: broadcast::Sender<SwarmEvent>,
    published: AtomicU64,
}

impl EventBus {
    /// A bus with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A bus with a custom channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            published: AtomicU64::new(0),
        }
    }

    /// Publish an event to all subscribers. Returns the receiver count.
    pub fn publish(&self, event: SwarmEvent) -> usize {
        let _ = self.published.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to all events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total events published over the bus lifetime.
    #[must_use]
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_event(id: &str, status: AgentStatus) -> SwarmEvent {
        SwarmEvent::AgentStatus {
            id: AgentId::new(id),
            status,
        }
    }

    #[test]
    fn publish_with_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(status_event("a1", AgentStatus::Busy)), 0);
        assert_eq!(bus.published_count(), 1);
    }

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let sent = status_event("a1", AgentStatus::Busy);
        assert_eq!(bus.publish(sent.clone()), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, sent);
        assert_eq!(received.kind(), "agent:status");
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.publish(status_event("a1", AgentStatus::Idle)), 2);
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();

        let _ = bus.publish(status_event("a1", AgentStatus::Busy));
        let _ = bus.publish(status_event("a2", AgentStatus::Busy));
        let _ = bus.publish(status_event("a3", AgentStatus::Busy));

        // Oldest event was dropped; receiver observes a lag error.
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn per_subscriber_ordering_is_fifo() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        for name in ["a1", "a2", "a3"] {
            let _ = bus.publish(status_event(name, AgentStatus::Busy));
        }
        for expected in ["a1", "a2", "a3"] {
            match rx.recv().await.unwrap() {
                SwarmEvent::AgentStatus { id, .. } => assert_eq!(id.as_str(), expected),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn kind_discriminants_match_wire_names() {
        let event = SwarmEvent::StreamChunk {
            id: AgentId::new("a1"),
            chunk: "hi".into(),
        };
        assert_eq!(event.kind(), "agent:stream:chunk");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "agent:stream:chunk");
    }

    #[test]
    fn serde_round_trip() {
        let event = SwarmEvent::Delegation {
            from_id: AgentId::new("l1"),
            from_name: "Lead".into(),
            to_id: AgentId::new("d1"),
            to_name: "Dev".into(),
            task: "build".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SwarmEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
