//! The [`Provider`] trait and its wire types.
//!
//! A provider exposes exactly one operation: open a streaming chat given a
//! prompt sequence plus options, returning a lazy stream of chunks. Each
//! chunk is either a text delta or the terminal `Done` with token usage —
//! at most one `Done`, and it is the last element.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use hive_core::agent::ProviderKind;
use serde::{Deserialize, Serialize};

/// Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Boxed chunk stream returned by [`Provider::stream`].
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

/// Speaker role in a prompt sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Prior assistant output.
    Assistant,
}

/// One element of a prompt sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-request generation options.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOptions {
    /// Sampling temperature, 0–1.
    pub temperature: f64,
    /// Maximum output tokens.
    pub max_tokens: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

/// One element of a provider stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamChunk {
    /// A text delta.
    Text {
        /// The delta.
        delta: String,
    },
    /// Terminal element carrying token usage.
    Done {
        /// Prompt tokens consumed.
        input_tokens: u64,
        /// Completion tokens produced.
        output_tokens: u64,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// ProviderError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialisation failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SSE stream parsing failed.
    #[error("SSE parse error: {message}")]
    SseParse {
        /// Error description.
        message: String,
    },

    /// Authentication failed.
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Backend returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Whether this error is transient.
        retryable: bool,
    },

    /// Stream was cancelled.
    #[error("Stream cancelled")]
    Cancelled,

    /// Backend-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ProviderError {
    /// Whether the adapter should retry this failure.
    ///
    /// Transient: connection reset/timeout, HTTP 429, and 5xx (incl. 503).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::Api { retryable, .. } => *retryable,
            Self::SseParse { .. }
            | Self::Auth { .. }
            | Self::Cancelled
            | Self::Json(_)
            | Self::Other { .. } => false,
        }
    }

    /// Error category string for logging and metrics.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) | Self::SseParse { .. } => "parse",
            Self::Auth { .. } => "auth",
            Self::Api { .. } => "api",
            Self::Cancelled => "cancelled",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Classify an HTTP status as retryable.
#[must_use]
pub fn status_is_retryable(status: u16) -> bool {
    status == 429 || status >= 500
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider trait
// ─────────────────────────────────────────────────────────────────────────────

/// Core provider trait. Implementors are `Send + Sync` and hold no
/// cross-request state beyond an immutable client handle.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Which backend this provider speaks to.
    fn kind(&self) -> ProviderKind;

    /// The model identifier requests are made with.
    fn model(&self) -> &str;

    /// Open a streaming chat.
    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> ProviderResult<ChunkStream>;
}
