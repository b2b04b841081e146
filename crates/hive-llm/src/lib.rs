//! # hive-llm
//!
//! Uniform streaming chat interface over heterogeneous model backends.
//!
//! Every backend (local chat, Anthropic, `OpenAI` chat, `OpenAI` completion,
//! `OpenAI`-compatible) implements [`Provider`], exposing one operation:
//! open a streaming chat for a prompt sequence and yield [`StreamChunk`]s —
//! text deltas followed by a single terminal `Done` carrying token usage.
//!
//! The adapter layer owns backend quirks (role coalescing, system-message
//! separation, completion-prompt flattening) and transient-failure retry
//! with exponential backoff.

#![deny(unsafe_code)]

pub mod anthropic;
pub mod convert;
pub mod factory;
pub mod local;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod sse;

pub use anthropic::AnthropicProvider;
pub use factory::{DefaultProviderFactory, ProviderFactory};
pub use local::LocalChatProvider;
pub use openai::{OpenAiChatProvider, OpenAiCompletionProvider};
pub use provider::{
    ChatMessage, ChatOptions, ChatRole, ChunkStream, Provider, ProviderError, ProviderResult,
    StreamChunk,
};
pub use retry::with_provider_retry;
