//! Providers speaking the OpenAI `/chat/completions` format.
//!
//! Covers OpenAI itself plus Groq, DeepSeek, Mistral, OpenRouter, Gemini's
//! compatibility endpoint and self-hosted servers such as vLLM or Ollama.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::LlmProviderConfig;
use crate::error::Result;
use crate::http::Endpoint;
use crate::provider::Provider;
use crate::types::{ChatRequest, Completion, FinishReason, TokenUsage};

pub struct OpenAiCompatProvider {
    endpoint: Endpoint,
}

impl OpenAiCompatProvider {
    /// Key read from `config.api_key_env` on each call.
    pub fn new(config: LlmProviderConfig) -> Self {
        Self {
            endpoint: Endpoint::new(config, None),
        }
    }

    pub fn with_api_key(config: LlmProviderConfig, api_key: String) -> Self {
        Self {
            endpoint: Endpoint::new(config, Some(api_key)),
        }
    }
}

#[derive(Deserialize)]
struct WireReply {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    // null for refusals and tool-only turns
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl From<WireReply> for Completion {
    fn from(reply: WireReply) -> Self {
        let first = reply.choices.into_iter().next();
        let finish = first
            .as_ref()
            .and_then(|c| c.finish_reason.as_deref())
            .map(FinishReason::from_wire);
        Completion {
            text: first.and_then(|c| c.message.content).unwrap_or_default(),
            finish,
            usage: reply.usage.map(|u| TokenUsage {
                input: u.prompt_tokens,
                output: u.completion_tokens,
            }),
            model: reply.model,
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.endpoint.config.name
    }

    async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
        let key = self.endpoint.api_key()?;
        let auth = [("Authorization", format!("Bearer {key}"))];
        let reply: WireReply = self
            .endpoint
            .post_json("chat/completions", &request.model, &auth, request)
            .await?;
        Ok(reply.into())
    }
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.endpoint.config.name)
            .field("base_url", &self.endpoint.config.base_url)
            .field("explicit_key", &self.endpoint.has_explicit_key())
            .finish()
    }
}
