//! `OpenAI` adapters — chat completions, legacy text completions, and
//! `OpenAI`-compatible endpoints.
//!
//! The chat adapter passes roles through and requests usage in the final
//! stream chunk. The completion adapter flattens the role-tagged sequence
//! into a `System:` / `Human:` / `Assistant:` prompt with a trailing
//! `Assistant:` cue. A compatible endpoint is the chat adapter pointed at a
//! different base URL, credential optional.

use async_trait::async_trait;
use futures::StreamExt;
use hive_core::agent::ProviderKind;
use serde_json::{json, Value};
use tracing::debug;

use crate::convert::completion_prompt;
use crate::provider::{
    status_is_retryable, ChatMessage, ChatOptions, ChatRole, ChunkStream, Provider,
    ProviderError, ProviderResult, StreamChunk,
};
use crate::sse::parse_sse_lines;

/// Default API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

async fn send_request(
    client: &reqwest::Client,
    url: String,
    api_key: Option<&str>,
    body: &Value,
) -> ProviderResult<reqwest::Response> {
    let mut request = client.post(url).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::Auth { message });
        }
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
            retryable: status_is_retryable(status.as_u16()),
        });
    }
    Ok(response)
}

/// Decode an SSE response into a chunk stream.
///
/// `extract` pulls the text delta out of a parsed event; usage is read from
/// the `usage` object whichever chunk carries it.
fn decode_stream(
    response: reqwest::Response,
    extract: fn(&Value) -> Option<&str>,
) -> ChunkStream {
    let lines = parse_sse_lines(response.bytes_stream());
    Box::pin(async_stream::stream! {
        let mut input_tokens = 0u64;
        let mut output_tokens = 0u64;
        futures::pin_mut!(lines);

        while let Some(data) = lines.next().await {
            let Ok(event) = serde_json::from_str::<Value>(&data) else {
                continue;
            };
            if let Some(delta) = extract(&event) {
                if !delta.is_empty() {
                    yield Ok(StreamChunk::Text { delta: delta.to_owned() });
                }
            }
            if let Some(usage) = event.get("usage").filter(|u| !u.is_null()) {
                input_tokens = usage["prompt_tokens"].as_u64().unwrap_or(input_tokens);
                output_tokens = usage["completion_tokens"].as_u64().unwrap_or(output_tokens);
            }
        }

        yield Ok(StreamChunk::Done { input_tokens, output_tokens });
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────────────────────────────────────

/// `OpenAI` chat-completions provider. Also serves compatible endpoints.
pub struct OpenAiChatProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
    kind: ProviderKind,
    client: reqwest::Client,
}

impl OpenAiChatProvider {
    /// A provider against the official endpoint.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: Some(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_owned(),
            kind: ProviderKind::OpenAiChat,
            client: reqwest::Client::new(),
        }
    }

    /// A provider against an `OpenAI`-compatible endpoint. The credential
    /// is optional — many local gateways accept anonymous requests.
    pub fn compatible(
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            model: model.into(),
            api_key,
            base_url: base_url.into(),
            kind: ProviderKind::OpenAiCompatible,
            client: reqwest::Client::new(),
        }
    }

    fn build_body(&self, messages: &[ChatMessage], options: &ChatOptions) -> Value {
        let rendered: Vec<Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role {
                        ChatRole::System => "system",
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                    },
                    "content": m.content,
                })
            })
            .collect();

        json!({
            "model": self.model,
            "messages": rendered,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
            "stream": true,
            "stream_options": {"include_usage": true},
        })
    }
}

#[async_trait]
impl Provider for OpenAiChatProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> ProviderResult<ChunkStream> {
        let body = self.build_body(messages, options);
        debug!(model = %self.model, base = %self.base_url, "opening openai chat stream");

        let response = send_request(
            &self.client,
            format!("{}/v1/chat/completions", self.base_url),
            self.api_key.as_deref(),
            &body,
        )
        .await?;

        Ok(decode_stream(response, |event| {
            event["choices"][0]["delta"]["content"].as_str()
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion
// ─────────────────────────────────────────────────────────────────────────────

/// `OpenAI` legacy text-completions provider.
pub struct OpenAiCompletionProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompletionProvider {
    /// A provider against the official endpoint.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: Some(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_owned(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Provider for OpenAiCompletionProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiCompletion
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> ProviderResult<ChunkStream> {
        let body = json!({
            "model": self.model,
            "prompt": completion_prompt(messages),
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
            "stream": true,
            "stream_options": {"include_usage": true},
        });
        debug!(model = %self.model, "opening openai completion stream");

        let response = send_request(
            &self.client,
            format!("{}/v1/completions", self.base_url),
            self.api_key.as_deref(),
            &body,
        )
        .await?;

        Ok(decode_stream(response, |event| {
            event["choices"][0]["text"].as_str()
        }))
    }
}
