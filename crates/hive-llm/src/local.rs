//! Local chat adapter — Ollama-style streaming JSON lines.
//!
//! The local backend streams newline-delimited JSON objects rather than
//! SSE. Each object carries a `message.content` delta; the final object has
//! `done: true` plus `prompt_eval_count` / `eval_count` token totals.

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use hive_core::agent::ProviderKind;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::{
    status_is_retryable, ChatMessage, ChatOptions, ChatRole, ChunkStream, Provider,
    ProviderError, ProviderResult, StreamChunk,
};

/// Default local endpoint.
const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Local chat provider.
pub struct LocalChatProvider {
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

impl LocalChatProvider {
    /// A provider for the given model against the default local endpoint.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the endpoint URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
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
            "stream": true,
            "options": {
                "temperature": options.temperature,
                "num_predict": options.max_tokens,
            },
        })
    }
}

#[async_trait]
impl Provider for LocalChatProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalChat
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
        debug!(model = %self.model, endpoint = %self.endpoint, "opening local chat stream");

        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
                retryable: status_is_retryable(status.as_u16()),
            });
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut buffer = BytesMut::with_capacity(8192);
            let mut input_tokens = 0u64;
            let mut output_tokens = 0u64;

            'outer: loop {
                while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line_bytes = buffer.split_to(newline_pos + 1);
                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        continue;
                    };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let Ok(event) = serde_json::from_str::<Value>(line) else {
                        continue;
                    };
                    if let Some(text) = event["message"]["content"].as_str() {
                        if !text.is_empty() {
                            yield Ok(StreamChunk::Text { delta: text.to_owned() });
                        }
                    }
                    if event["done"].as_bool() == Some(true) {
                        input_tokens = event["prompt_eval_count"].as_u64().unwrap_or(0);
                        output_tokens = event["eval_count"].as_u64().unwrap_or(0);
                        break 'outer;
                    }
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        yield Err(ProviderError::Http(e));
                        return;
                    }
                    None => break,
                }
            }

            yield Ok(StreamChunk::Done { input_tokens, output_tokens });
        };

        Ok(Box::pin(stream))
    }
}
