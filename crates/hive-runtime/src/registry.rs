//! In-memory agent registry with read-through persistence.
//!
//! The registry is the only shared state in the kernel. Reads are
//! concurrent; writes are serialised per agent through the record's lock.
//! Every CRUD operation publishes the corresponding `agent:*` event with a
//! sanitised payload and persists fire-and-forget through the optional
//! store collaborator.

use std::sync::Arc;

use dashmap::DashMap;
use hive_core::agent::{Agent, AgentStatus, AgentUpdate, RagDoc, SanitizedAgent, Todo};
use hive_core::events::{EventBus, SwarmEvent};
use hive_core::history::HistoryEntry;
use hive_core::ids::AgentId;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::errors::SwarmError;
use crate::persistence::AgentStore;

/// Id-keyed agent store with insertion-order tracking for name resolution.
pub struct AgentRegistry {
    agents: DashMap<AgentId, Arc<RwLock<Agent>>>,
    order: Mutex<Vec<AgentId>>,
    bus: Arc<EventBus>,
    store: Option<Arc<dyn AgentStore>>,
}

impl AgentRegistry {
    /// A registry publishing to `bus`, persisting through `store` when
    /// present (in-memory mode otherwise).
    pub fn new(bus: Arc<EventBus>, store: Option<Arc<dyn AgentStore>>) -> Self {
        Self {
            agents: DashMap::new(),
            order: Mutex::new(Vec::new()),
            bus,
            store,
        }
    }

    /// Startup load from the persistence collaborator: status reset to
    /// idle, thinking buffers cleared. Returns the number loaded.
    pub async fn load(&self) -> Result<usize, SwarmError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let agents = store.load_all().await?;
        let count = agents.len();
        for mut agent in agents {
            agent.status = AgentStatus::Idle;
            agent.current_thinking.clear();
            self.insert(agent);
        }
        info!(count, "registry loaded from store");
        Ok(count)
    }

    fn insert(&self, agent: Agent) {
        let id = agent.id.clone();
        let _ = self.agents.insert(id.clone(), Arc::new(RwLock::new(agent)));
        self.order.lock().push(id);
    }

    fn record(&self, id: &AgentId) -> Result<Arc<RwLock<Agent>>, SwarmError> {
        self.agents
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| SwarmError::agent_not_found(id))
    }

    /// Fire-and-forget persistence of the agent's current state.
    pub fn persist(&self, id: &AgentId) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let Ok(snapshot) = self.snapshot(id) else {
            return;
        };
        let _handle = tokio::spawn(async move {
            if let Err(e) = store.save(&snapshot).await {
                warn!(agent = %snapshot.id, "agent save failed: {e}");
            }
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // CRUD
    // ─────────────────────────────────────────────────────────────────────

    /// Create an agent from a spec.
    pub fn create(&self, spec: hive_core::agent::AgentSpec) -> Result<SanitizedAgent, SwarmError> {
        if spec.name.trim().is_empty() {
            return Err(SwarmError::bad_request("agent name is required"));
        }
        if spec.model.trim().is_empty() {
            return Err(SwarmError::bad_request("model is required"));
        }

        let agent = Agent::from_spec(spec);
        let view = agent.sanitized();
        let id = agent.id.clone();
        self.insert(agent);

        let _ = self.bus.publish(SwarmEvent::AgentCreated {
            agent: view.clone(),
        });
        self.persist(&id);
        info!(agent = %id, name = %view.name, "agent created");
        Ok(view)
    }

    /// Sanitised read of one agent.
    pub fn get(&self, id: &AgentId) -> Result<SanitizedAgent, SwarmError> {
        Ok(self.record(id)?.read().sanitized())
    }

    /// Sanitised read of every agent, in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<SanitizedAgent> {
        let order = self.order.lock().clone();
        order
            .iter()
            .filter_map(|id| self.agents.get(id).map(|entry| entry.read().sanitized()))
            .collect()
    }

    /// Full record clone, credential included. Kernel-internal.
    pub fn snapshot(&self, id: &AgentId) -> Result<Agent, SwarmError> {
        Ok(self.record(id)?.read().clone())
    }

    /// Apply a whitelisted update patch.
    pub fn update(&self, id: &AgentId, update: AgentUpdate) -> Result<SanitizedAgent, SwarmError> {
        let record = self.record(id)?;
        let view = {
            let mut agent = record.write();
            agent.apply_update(update);
            agent.sanitized()
        };
        let _ = self.bus.publish(SwarmEvent::AgentUpdated {
            agent: view.clone(),
        });
        self.persist(id);
        Ok(view)
    }

    /// Remove an agent. The engine is responsible for cancelling in-flight
    /// work and tearing down the task lane before calling this.
    pub fn delete(&self, id: &AgentId) -> Result<SanitizedAgent, SwarmError> {
        let (_, record) = self
            .agents
            .remove(id)
            .ok_or_else(|| SwarmError::agent_not_found(id))?;
        self.order.lock().retain(|existing| existing != id);

        let view = record.read().sanitized();
        let _ = self.bus.publish(SwarmEvent::AgentDeleted {
            agent: view.clone(),
        });
        if let Some(store) = self.store.clone() {
            let id = id.clone();
            let _handle = tokio::spawn(async move {
                if let Err(e) = store.delete(&id).await {
                    warn!(agent = %id, "agent delete failed: {e}");
                }
            });
        }
        info!(agent = %id, "agent deleted");
        Ok(view)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Runtime state
    // ─────────────────────────────────────────────────────────────────────

    /// Mutate one agent under its write lock.
    pub fn with_agent_mut<R>(
        &self,
        id: &AgentId,
        f: impl FnOnce(&mut Agent) -> R,
    ) -> Result<R, SwarmError> {
        let record = self.record(id)?;
        let mut agent = record.write();
        Ok(f(&mut agent))
    }

    /// Read one agent under its read lock.
    pub fn with_agent<R>(
        &self,
        id: &AgentId,
        f: impl FnOnce(&Agent) -> R,
    ) -> Result<R, SwarmError> {
        let record = self.record(id)?;
        let agent = record.read();
        Ok(f(&agent))
    }

    /// Set runtime status, publishing `agent:status`.
    pub fn set_status(&self, id: &AgentId, status: AgentStatus) -> Result<(), SwarmError> {
        self.with_agent_mut(id, |agent| agent.status = status)?;
        let _ = self.bus.publish(SwarmEvent::AgentStatus {
            id: id.clone(),
            status,
        });
        Ok(())
    }

    /// Resolve a display name case-insensitively, excluding `exclude`,
    /// first match by registry insertion order.
    #[must_use]
    pub fn resolve_name(&self, name: &str, exclude: Option<&AgentId>) -> Option<(AgentId, String)> {
        let wanted = name.trim().to_lowercase();
        let order = self.order.lock().clone();
        for id in &order {
            if exclude == Some(id) {
                continue;
            }
            if let Some(entry) = self.agents.get(id) {
                let agent_name = entry.read().name.clone();
                if agent_name.to_lowercase() == wanted {
                    return Some((id.clone(), agent_name));
                }
            }
        }
        None
    }

    // ─────────────────────────────────────────────────────────────────────
    // Todos and reference documents
    // ─────────────────────────────────────────────────────────────────────

    /// Append a todo.
    pub fn add_todo(&self, id: &AgentId, text: impl Into<String>) -> Result<Todo, SwarmError> {
        let todo = Todo::new(text);
        let stored = todo.clone();
        self.with_agent_mut(id, move |agent| agent.todos.push(stored))?;
        self.publish_updated(id);
        Ok(todo)
    }

    /// Flip a todo's done flag. Toggling off clears the completion
    /// timestamp; toggling on does not forge one — that is reserved for
    /// completion via the engine.
    pub fn toggle_todo(&self, id: &AgentId, todo_id: &str) -> Result<Todo, SwarmError> {
        let toggled = self.with_agent_mut(id, |agent| {
            agent.todos.iter_mut().find(|t| t.id == todo_id).map(|t| {
                t.done = !t.done;
                if !t.done {
                    t.completed_at = None;
                }
                t.clone()
            })
        })?;
        let todo = toggled.ok_or_else(|| SwarmError::todo_not_found(todo_id))?;
        self.publish_updated(id);
        Ok(todo)
    }

    /// Mark a todo done with a completion timestamp (engine path).
    pub fn complete_todo(&self, id: &AgentId, todo_id: &str) -> Result<(), SwarmError> {
        let found = self.with_agent_mut(id, |agent| {
            agent
                .todos
                .iter_mut()
                .find(|t| t.id == todo_id)
                .map(|t| {
                    t.done = true;
                    t.completed_at = Some(chrono::Utc::now());
                })
                .is_some()
        })?;
        if !found {
            return Err(SwarmError::todo_not_found(todo_id));
        }
        self.publish_updated(id);
        Ok(())
    }

    /// Remove a todo.
    pub fn delete_todo(&self, id: &AgentId, todo_id: &str) -> Result<(), SwarmError> {
        let removed = self.with_agent_mut(id, |agent| {
            let before = agent.todos.len();
            agent.todos.retain(|t| t.id != todo_id);
            agent.todos.len() != before
        })?;
        if !removed {
            return Err(SwarmError::todo_not_found(todo_id));
        }
        self.publish_updated(id);
        Ok(())
    }

    /// Attach a reference document.
    pub fn add_rag_doc(
        &self,
        id: &AgentId,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<RagDoc, SwarmError> {
        let doc = RagDoc::new(name, content);
        let stored = doc.clone();
        self.with_agent_mut(id, move |agent| agent.rag_docs.push(stored))?;
        self.publish_updated(id);
        Ok(doc)
    }

    /// Remove a reference document.
    pub fn delete_rag_doc(&self, id: &AgentId, doc_id: &str) -> Result<(), SwarmError> {
        let removed = self.with_agent_mut(id, |agent| {
            let before = agent.rag_docs.len();
            agent.rag_docs.retain(|d| d.id != doc_id);
            agent.rag_docs.len() != before
        })?;
        if !removed {
            return Err(SwarmError::NotFound {
                kind: "document",
                id: doc_id.to_owned(),
            });
        }
        self.publish_updated(id);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────

    /// Full history of one agent.
    pub fn history(&self, id: &AgentId) -> Result<Vec<HistoryEntry>, SwarmError> {
        self.with_agent(id, |agent| agent.history.clone())
    }

    /// Drop all history. Idempotent.
    pub fn clear_history(&self, id: &AgentId) -> Result<(), SwarmError> {
        self.with_agent_mut(id, |agent| agent.history.clear())?;
        self.publish_updated(id);
        Ok(())
    }

    /// Drop all entries with index strictly greater than `after_index` —
    /// the "restart from here" primitive.
    pub fn truncate_history(&self, id: &AgentId, after_index: usize) -> Result<(), SwarmError> {
        self.with_agent_mut(id, |agent| {
            agent.history.truncate(after_index.saturating_add(1));
        })?;
        self.publish_updated(id);
        Ok(())
    }

    fn publish_updated(&self, id: &AgentId) {
        if let Ok(view) = self.get(id) {
            let _ = self.bus.publish(SwarmEvent::AgentUpdated { agent: view });
        }
        self.persist(id);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
