//! # hive-core
//!
//! Foundation types and utilities shared by every Hive crate:
//!
//! - **Branded IDs**: [`AgentId`] as a newtype for type safety
//! - **Agent model**: [`Agent`], [`Todo`], [`RagDoc`], [`AgentMetrics`],
//!   plus the sanitised read view [`SanitizedAgent`]
//! - **History**: [`HistoryEntry`] with a tagged [`Provenance`] enum
//! - **Tool vocabulary**: [`ToolName`], [`ToolCall`], [`ToolResult`]
//! - **Delegations**: [`Delegation`], [`DelegationResult`]
//! - **Events**: [`SwarmEvent`] and the broadcast [`EventBus`]
//! - **Retry**: [`RetryConfig`] and backoff math
//! - **Config**: [`SwarmConfig`] with serde defaults
//! - **Logging**: [`logging::init_subscriber`] tracing bootstrap

#![deny(unsafe_code)]

pub mod agent;
pub mod config;
pub mod delegation;
pub mod events;
pub mod history;
pub mod ids;
pub mod logging;
pub mod retry;
pub mod tools;

pub use agent::{
    Agent, AgentMetrics, AgentSpec, AgentStatus, AgentUpdate, ProviderKind, RagDoc,
    SanitizedAgent, Todo,
};
pub use config::SwarmConfig;
pub use delegation::{Delegation, DelegationResult};
pub use events::{EventBus, SwarmEvent};
pub use history::{HistoryEntry, Provenance, Role};
pub use ids::AgentId;
pub use retry::RetryConfig;
pub use tools::{ToolCall, ToolName, ToolResult};
