//! Anthropic adapter — streams from the Messages API.
//!
//! Backend quirks handled here: the system message is extracted to the
//! top-level `system` parameter, and consecutive same-role messages are
//! coalesced (the API rejects non-alternating role sequences). Usage comes
//! from `message_start` (input) and `message_delta` (output) events.

use async_trait::async_trait;
use futures::StreamExt;
use hive_core::agent::ProviderKind;
use serde_json::{json, Value};
use tracing::debug;

use crate::convert::{coalesce_same_role, split_system};
use crate::provider::{
    status_is_retryable, ChatMessage, ChatOptions, ChunkStream, Provider, ProviderError,
    ProviderResult, StreamChunk,
};
use crate::sse::parse_sse_lines;

/// Default API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
/// API version header value.
const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a provider for the given model and key.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
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

    fn build_body(
        &self,
        system: Option<&str>,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Value {
        let rendered: Vec<Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role {
                        crate::provider::ChatRole::Assistant => "assistant",
                        _ => "user",
                    },
                    "content": m.content,
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": rendered,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "stream": true,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }
        body
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> ProviderResult<ChunkStream> {
        let (system, rest) = split_system(messages);
        let rest = coalesce_same_role(rest);
        let body = self.build_body(system.as_deref(), &rest, options);

        debug!(model = %self.model, messages = rest.len(), "opening anthropic stream");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

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

        let lines = parse_sse_lines(response.bytes_stream());
        let stream = async_stream::stream! {
            let mut input_tokens = 0u64;
            let mut output_tokens = 0u64;
            futures::pin_mut!(lines);

            while let Some(data) = lines.next().await {
                let Ok(event) = serde_json::from_str::<Value>(&data) else {
                    continue;
                };
                match event["type"].as_str() {
                    Some("message_start") => {
                        input_tokens = event["message"]["usage"]["input_tokens"]
                            .as_u64()
                            .unwrap_or(0);
                    }
                    Some("content_block_delta") => {
                        if let Some(text) = event["delta"]["text"].as_str() {
                            yield Ok(StreamChunk::Text { delta: text.to_owned() });
                        }
                    }
                    Some("message_delta") => {
                        if let Some(tokens) = event["usage"]["output_tokens"].as_u64() {
                            output_tokens = tokens;
                        }
                    }
                    Some("error") => {
                        let message = event["error"]["message"]
                            .as_str()
                            .unwrap_or("unknown stream error")
                            .to_owned();
                        yield Err(ProviderError::Other { message });
                        return;
                    }
                    _ => {}
                }
            }

            yield Ok(StreamChunk::Done { input_tokens, output_tokens });
        };

        Ok(Box::pin(stream))
    }
}
