//! Agent persistence collaborator.
//!
//! The kernel calls [`AgentStore`] fire-and-forget for saves and once at
//! startup for `load_all`. A missing store is tolerated — the registry then
//! runs purely in memory.
//!
//! [`SqliteAgentStore`] persists each agent as a single JSON blob keyed by
//! id, with creation and update timestamps. The credential is stored in
//! clear: the database shares the trust boundary of the host filesystem.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use hive_core::agent::Agent;
use hive_core::ids::AgentId;
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::debug;

use crate::errors::SwarmError;

/// Persistence collaborator interface.
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Load every persisted agent, in creation order.
    async fn load_all(&self) -> Result<Vec<Agent>, SwarmError>;
    /// Persist one agent (insert or replace).
    async fn save(&self, agent: &Agent) -> Result<(), SwarmError>;
    /// Remove one agent.
    async fn delete(&self, id: &AgentId) -> Result<(), SwarmError>;
}

fn persistence_error(context: &str, e: impl std::fmt::Display) -> SwarmError {
    SwarmError::Persistence {
        message: format!("{context}: {e}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite store
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed agent store.
pub struct SqliteAgentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAgentStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self, SwarmError> {
        let conn = Connection::open(path).map_err(|e| persistence_error("open database", e))?;
        Self::from_connection(conn)
    }

    /// An in-memory database, for tests.
    pub fn open_in_memory() -> Result<Self, SwarmError> {
        let conn =
            Connection::open_in_memory().map_err(|e| persistence_error("open database", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, SwarmError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             CREATE TABLE IF NOT EXISTS agents (
                 id         TEXT PRIMARY KEY,
                 record     TEXT NOT NULL,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );",
        )
        .map_err(|e| persistence_error("migrate", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl AgentStore for SqliteAgentStore {
    async fn load_all(&self) -> Result<Vec<Agent>, SwarmError> {
        let conn = self.conn.lock();
        let mut statement = conn
            .prepare("SELECT record FROM agents ORDER BY created_at, id")
            .map_err(|e| persistence_error("prepare load", e))?;

        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| persistence_error("query agents", e))?;

        let mut agents = Vec::new();
        for raw in rows {
            let raw = raw.map_err(|e| persistence_error("read row", e))?;
            let agent: Agent = serde_json::from_str(&raw)
                .map_err(|e| persistence_error("decode agent record", e))?;
            agents.push(agent);
        }
        debug!(count = agents.len(), "loaded agents from store");
        Ok(agents)
    }

    async fn save(&self, agent: &Agent) -> Result<(), SwarmError> {
        let record = serde_json::to_string(agent)
            .map_err(|e| persistence_error("encode agent record", e))?;
        let conn = self.conn.lock();
        let _ = conn
            .execute(
                "INSERT INTO agents (id, record, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET record = ?2, updated_at = ?4",
                (
                    agent.id.as_str(),
                    record,
                    agent.created_at.to_rfc3339(),
                    agent.updated_at.to_rfc3339(),
                ),
            )
            .map_err(|e| persistence_error("save agent", e))?;
        Ok(())
    }

    async fn delete(&self, id: &AgentId) -> Result<(), SwarmError> {
        let conn = self.conn.lock();
        let _ = conn
            .execute("DELETE FROM agents WHERE id = ?1", [id.as_str()])
            .map_err(|e| persistence_error("delete agent", e))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory store, for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryAgentStore {
    agents: Mutex<Vec<Agent>>,
}

impl MemoryAgentStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for MemoryAgentStore {
    async fn load_all(&self) -> Result<Vec<Agent>, SwarmError> {
        Ok(self.agents.lock().clone())
    }

    async fn save(&self, agent: &Agent) -> Result<(), SwarmError> {
        let mut agents = self.agents.lock();
        if let Some(existing) = agents.iter_mut().find(|a| a.id == agent.id) {
            *existing = agent.clone();
        } else {
            agents.push(agent.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: &AgentId) -> Result<(), SwarmError> {
        self.agents.lock().retain(|a| &a.id != id);
        Ok(())
    }
}
