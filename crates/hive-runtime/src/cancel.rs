//! Cancellation fabric: one token per busy agent.
//!
//! The streaming loop polls the token between chunks, which bounds
//! cancellation latency to one model chunk. Nested continuations of the
//! same agent share the registered token; delegations to other agents have
//! their own and keep running unless they too are cancelled.

use dashmap::DashMap;
use hive_core::ids::AgentId;
use tokio_util::sync::CancellationToken;

/// Per-agent cancellation tokens.
#[derive(Default)]
pub struct CancelRegistry {
    tokens: DashMap<AgentId, CancellationToken>,
}

impl CancelRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token for an agent, replacing any stale one.
    pub fn register(&self, id: &AgentId) -> CancellationToken {
        let token = CancellationToken::new();
        let _ = self.tokens.insert(id.clone(), token.clone());
        token
    }

    /// The active token for an agent, if one is registered.
    #[must_use]
    pub fn get(&self, id: &AgentId) -> Option<CancellationToken> {
        self.tokens.get(id).map(|entry| entry.clone())
    }

    /// Trip an agent's token. Returns whether one was registered.
    pub fn cancel(&self, id: &AgentId) -> bool {
        if let Some(entry) = self.tokens.get(id) {
            entry.cancel();
            true
        } else {
            false
        }
    }

    /// Drop an agent's token at turn teardown or deletion.
    pub fn remove(&self, id: &AgentId) {
        let _ = self.tokens.remove(id);
    }

    /// Number of registered tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no tokens are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
