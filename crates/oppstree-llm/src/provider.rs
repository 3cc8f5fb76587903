//! The [`Provider`] seam and construction from config.

use std::sync::Arc;

use async_trait::async_trait;

use oppstree_types::ProviderApi;

use crate::anthropic::AnthropicProvider;
use crate::config::LlmProviderConfig;
use crate::error::Result;
use crate::openai_compat::OpenAiCompatProvider;
use crate::types::{ChatRequest, Completion};

/// One configured LLM endpoint.
///
/// Implementations own the wire format and authentication for their API
/// and report truncation as [`FinishReason::Length`](crate::FinishReason).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Configured name, e.g. "groq".
    fn name(&self) -> &str;

    async fn complete(&self, request: &ChatRequest) -> Result<Completion>;
}

/// Build the provider matching `config.api`. The API key is looked up
/// per request, so this never fails.
pub fn connect(config: LlmProviderConfig) -> Arc<dyn Provider> {
    match config.api {
        ProviderApi::OpenAi => Arc::new(OpenAiCompatProvider::new(config)),
        ProviderApi::Anthropic => Arc::new(AnthropicProvider::new(config)),
    }
}
