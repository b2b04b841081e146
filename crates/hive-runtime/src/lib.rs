//! # hive-runtime
//!
//! The orchestration kernel: agent registry, per-agent task lanes, the
//! cancellation fabric, and the conversation engine that ties them to the
//! provider adapters and the tool dispatcher.
//!
//! The kernel holds no global state. A process constructs an
//! [`EventBus`](hive_core::EventBus), an [`AgentRegistry`], and a
//! [`ConversationEngine`], wiring them together explicitly.

#![deny(unsafe_code)]

pub mod cancel;
pub mod delegation;
pub mod engine;
pub mod errors;
pub mod persistence;
pub mod queue;
pub mod registry;

pub use cancel::CancelRegistry;
pub use delegation::parse_delegations;
pub use engine::{BroadcastOutcome, ConversationEngine, OnChunk};
pub use errors::SwarmError;
pub use persistence::{AgentStore, MemoryAgentStore, SqliteAgentStore};
pub use queue::TaskLanes;
pub use registry::AgentRegistry;
