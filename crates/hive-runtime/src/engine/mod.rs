//! The conversation engine: the per-agent turn loop.
//!
//! A turn moves through `idle → building → streaming → post-processing →
//! idle|error`. Building composes the prompt from the agent record;
//! streaming consumes the provider stream while eagerly dispatching
//! delegations; post-processing executes tool calls, awaits delegations,
//! and recurses with a continuation message, up to the depth limit.
//!
//! The engine is constructed from its collaborators — registry, event bus,
//! provider factory, dispatcher, lanes, cancellation registry — and holds
//! no global state.

mod continuation;
mod prompt;
mod turn;

use std::sync::Arc;

use hive_core::agent::SanitizedAgent;
use hive_core::config::SwarmConfig;
use hive_core::events::{EventBus, SwarmEvent};
use hive_core::history::{HistoryEntry, Provenance, Role};
use hive_core::ids::AgentId;
use hive_llm::factory::ProviderFactory;
use hive_tools::dispatcher::ToolDispatcher;
use serde::Serialize;
use tracing::info;

use crate::cancel::CancelRegistry;
use crate::errors::SwarmError;
use crate::queue::TaskLanes;
use crate::registry::AgentRegistry;

/// Subscriber callback for assistant chunks and engine-injected section
/// markers. Assumed non-blocking.
pub type OnChunk = Arc<dyn Fn(&str) + Send + Sync>;

/// A callback that discards chunks (events still flow over the bus).
#[must_use]
pub fn noop_chunk() -> OnChunk {
    Arc::new(|_| {})
}

/// Per-agent outcome of a broadcast.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastOutcome {
    /// Agent id.
    pub id: AgentId,
    /// Agent display name.
    pub name: String,
    /// Final response on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Error text on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The orchestration kernel's turn engine.
pub struct ConversationEngine {
    pub(crate) registry: Arc<AgentRegistry>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) providers: Arc<dyn ProviderFactory>,
    pub(crate) dispatcher: Arc<ToolDispatcher>,
    pub(crate) lanes: Arc<TaskLanes>,
    pub(crate) cancels: Arc<CancelRegistry>,
    pub(crate) config: SwarmConfig,
}

impl ConversationEngine {
    /// Build an engine over its collaborators.
    pub fn new(
        registry: Arc<AgentRegistry>,
        bus: Arc<EventBus>,
        providers: Arc<dyn ProviderFactory>,
        config: SwarmConfig,
    ) -> Self {
        Self {
            registry,
            bus,
            providers,
            dispatcher: Arc::new(ToolDispatcher::new()),
            lanes: Arc::new(TaskLanes::new()),
            cancels: Arc::new(CancelRegistry::new()),
            config,
        }
    }

    /// Substitute the tool dispatcher (tests).
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<ToolDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// The cancellation registry, for transports that expose stop directly.
    #[must_use]
    pub fn cancels(&self) -> &Arc<CancelRegistry> {
        &self.cancels
    }

    // ─────────────────────────────────────────────────────────────────────
    // Turn entry points
    // ─────────────────────────────────────────────────────────────────────

    /// Run one user-initiated turn for an agent.
    pub async fn chat(
        self: &Arc<Self>,
        id: &AgentId,
        message: &str,
        on_chunk: OnChunk,
    ) -> Result<String, SwarmError> {
        self.clone()
            .chat_inner(id.clone(), message.to_owned(), 0, Provenance::Plain, on_chunk)
            .await
    }

    /// Stop an agent's in-flight turn: trip the token, clear the thinking
    /// buffer, return to idle, publish `agent:stopped`.
    pub fn stop(&self, id: &AgentId) -> Result<(), SwarmError> {
        let name = self.registry.with_agent(id, |agent| agent.name.clone())?;
        let had_token = self.cancels.cancel(id);
        self.registry
            .with_agent_mut(id, |agent| agent.current_thinking.clear())?;
        self.registry
            .set_status(id, hive_core::agent::AgentStatus::Idle)?;
        let _ = self.bus.publish(SwarmEvent::Stopped {
            id: id.clone(),
            name,
        });
        info!(agent = %id, had_token, "agent stopped by user");
        Ok(())
    }

    /// Delete an agent: cancel in-flight work, tear down its lane, remove
    /// the record.
    pub fn delete_agent(&self, id: &AgentId) -> Result<SanitizedAgent, SwarmError> {
        let _ = self.cancels.cancel(id);
        self.cancels.remove(id);
        self.lanes.remove(id);
        self.registry.delete(id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Compound operations
    // ─────────────────────────────────────────────────────────────────────

    /// Run one turn on every agent in parallel, collecting per-agent
    /// outcomes. Dispatches directly — each target is distinct, so the
    /// per-agent lanes are unnecessary here.
    pub async fn broadcast(
        self: &Arc<Self>,
        message: &str,
        on_chunk: OnChunk,
    ) -> Vec<BroadcastOutcome> {
        let agents = self.registry.list();
        let turns = agents.into_iter().map(|agent| {
            let engine = self.clone();
            let message = message.to_owned();
            let on_chunk = on_chunk.clone();
            async move {
                let result = engine
                    .clone()
                    .chat_inner(agent.id.clone(), message, 0, Provenance::Plain, on_chunk)
                    .await;
                match result {
                    Ok(response) => BroadcastOutcome {
                        id: agent.id,
                        name: agent.name,
                        response: Some(response),
                        error: None,
                    },
                    Err(e) => BroadcastOutcome {
                        id: agent.id,
                        name: agent.name,
                        response: None,
                        error: Some(e.to_string()),
                    },
                }
            }
        });
        futures::future::join_all(turns).await
    }

    /// Scripted cross-agent transfer: hand the source's recent history to
    /// the target as a synthetic user message.
    pub async fn handoff(
        self: &Arc<Self>,
        from: &AgentId,
        to: &AgentId,
        context: &str,
        on_chunk: OnChunk,
    ) -> Result<String, SwarmError> {
        let source = self.registry.snapshot(from)?;
        let target = self.registry.get(to)?;

        let window = self.config.handoff_window;
        let start = source.history.len().saturating_sub(window);
        let recent = &source.history[start..];

        let mut message = format!("[HANDOFF from {}]: {}", source.name, context);
        if !recent.is_empty() {
            message.push_str("\n\nRecent conversation:\n");
            for entry in recent {
                let role = match entry.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                message.push_str(&format!("[{role}] {}\n", entry.content));
            }
        }

        let _ = self.bus.publish(SwarmEvent::Handoff {
            from_id: source.id.clone(),
            from_name: source.name.clone(),
            to_id: target.id.clone(),
            to_name: target.name.clone(),
        });

        self.clone()
            .chat_inner(to.clone(), message, 0, Provenance::Plain, on_chunk)
            .await
    }

    /// Send a todo's text through the engine; mark it done on success.
    pub async fn execute_todo(
        self: &Arc<Self>,
        id: &AgentId,
        todo_id: &str,
        on_chunk: OnChunk,
    ) -> Result<String, SwarmError> {
        let text = self
            .registry
            .with_agent(id, |agent| {
                agent
                    .todos
                    .iter()
                    .find(|t| t.id == todo_id)
                    .map(|t| t.text.clone())
            })?
            .ok_or_else(|| SwarmError::todo_not_found(todo_id))?;

        let response = self
            .clone()
            .chat_inner(id.clone(), text, 0, Provenance::Plain, on_chunk)
            .await?;
        self.registry.complete_todo(id, todo_id)?;
        Ok(response)
    }

    /// Run all pending todos sequentially, tolerating individual failures.
    /// Returns `(todo_id, outcome)` pairs in execution order.
    pub async fn execute_all_todos(
        self: &Arc<Self>,
        id: &AgentId,
        on_chunk: OnChunk,
    ) -> Result<Vec<(String, Result<String, SwarmError>)>, SwarmError> {
        let pending: Vec<_> = self.registry.with_agent(id, |agent| {
            agent
                .todos
                .iter()
                .filter(|t| !t.done)
                .map(|t| t.id.clone())
                .collect()
        })?;

        let mut outcomes = Vec::with_capacity(pending.len());
        for todo_id in pending {
            let outcome = self.execute_todo(id, &todo_id, on_chunk.clone()).await;
            outcomes.push((todo_id, outcome));
        }
        Ok(outcomes)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals shared with turn.rs
    // ─────────────────────────────────────────────────────────────────────

    pub(crate) fn record_user_entry(
        &self,
        id: &AgentId,
        content: &str,
        provenance: Provenance,
    ) -> Result<(), SwarmError> {
        self.registry.with_agent_mut(id, |agent| {
            agent
                .history
                .push(HistoryEntry::tagged(Role::User, content, provenance));
        })
    }
}
