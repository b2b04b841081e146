//! Provider construction from agent configuration.
//!
//! The engine resolves an agent's provider selector to a concrete adapter
//! through [`ProviderFactory`], so tests can substitute scripted providers.

use std::sync::Arc;

use hive_core::agent::ProviderKind;

use crate::anthropic::AnthropicProvider;
use crate::local::LocalChatProvider;
use crate::openai::{OpenAiChatProvider, OpenAiCompletionProvider};
use crate::provider::{Provider, ProviderError, ProviderResult};

/// Creates a provider for an agent's backend configuration.
pub trait ProviderFactory: Send + Sync {
    /// Build a provider for the given selector, model, endpoint override,
    /// and credential.
    fn create(
        &self,
        kind: ProviderKind,
        model: &str,
        endpoint: Option<&str>,
        credential: Option<&str>,
    ) -> ProviderResult<Arc<dyn Provider>>;
}

/// Factory producing the real HTTP-backed adapters.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultProviderFactory;

impl ProviderFactory for DefaultProviderFactory {
    fn create(
        &self,
        kind: ProviderKind,
        model: &str,
        endpoint: Option<&str>,
        credential: Option<&str>,
    ) -> ProviderResult<Arc<dyn Provider>> {
        let missing_credential = || ProviderError::Auth {
            message: format!("no credential configured for {model}"),
        };

        match kind {
            ProviderKind::LocalChat => {
                let mut provider = LocalChatProvider::new(model);
                if let Some(endpoint) = endpoint {
                    provider = provider.with_endpoint(endpoint);
                }
                Ok(Arc::new(provider))
            }
            ProviderKind::Anthropic => {
                let key = credential.ok_or_else(missing_credential)?;
                let mut provider = AnthropicProvider::new(model, key);
                if let Some(endpoint) = endpoint {
                    provider = provider.with_base_url(endpoint);
                }
                Ok(Arc::new(provider))
            }
            ProviderKind::OpenAiChat => {
                let key = credential.ok_or_else(missing_credential)?;
                Ok(Arc::new(OpenAiChatProvider::new(model, key)))
            }
            ProviderKind::OpenAiCompletion => {
                let key = credential.ok_or_else(missing_credential)?;
                let mut provider = OpenAiCompletionProvider::new(model, key);
                if let Some(endpoint) = endpoint {
                    provider = provider.with_base_url(endpoint);
                }
                Ok(Arc::new(provider))
            }
            ProviderKind::OpenAiCompatible => {
                let endpoint = endpoint.ok_or_else(|| ProviderError::Other {
                    message: format!("no endpoint configured for compatible backend {model}"),
                })?;
                Ok(Arc::new(OpenAiChatProvider::compatible(
                    model,
                    endpoint,
                    credential.map(str::to_owned),
                )))
            }
        }
    }
}
