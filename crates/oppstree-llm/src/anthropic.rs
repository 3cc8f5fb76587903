//! Native Anthropic Messages API.
//!
//! System messages move to the top-level `system` field and `max_tokens`
//! is always sent, since the API requires it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmProviderConfig;
use crate::error::{ProviderError, Result};
use crate::http::Endpoint;
use crate::provider::Provider;
use crate::types::{ChatMessage, ChatRequest, Completion, FinishReason, TokenUsage};

/// Sent as `anthropic-version`.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const FALLBACK_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    endpoint: Endpoint,
}

impl AnthropicProvider {
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

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<&'a ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

impl<'a> From<&'a ChatRequest> for MessagesBody<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        Self {
            model: &request.model,
            max_tokens: request.max_tokens.unwrap_or(FALLBACK_MAX_TOKENS),
            system: request.system_prompt(),
            messages: request.turns().collect(),
            temperature: request.temperature,
        }
    }
}

#[derive(Deserialize)]
struct MessagesReply {
    #[serde(default)]
    model: String,
    content: Option<Vec<ContentBlock>>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ReplyUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ReplyUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl TryFrom<MessagesReply> for Completion {
    type Error = ProviderError;

    fn try_from(reply: MessagesReply) -> Result<Self> {
        let blocks = reply
            .content
            .ok_or_else(|| ProviderError::Malformed("no content blocks".into()))?;
        let text = blocks
            .into_iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text)
            .collect();
        Ok(Completion {
            text,
            finish: reply.stop_reason.as_deref().map(FinishReason::from_wire),
            usage: reply.usage.map(|u| TokenUsage {
                input: u.input_tokens,
                output: u.output_tokens,
            }),
            model: reply.model,
        })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.endpoint.config.name
    }

    async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
        let auth = [
            ("x-api-key", self.endpoint.api_key()?),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ];
        let reply: MessagesReply = self
            .endpoint
            .post_json("messages", &request.model, &auth, &MessagesBody::from(request))
            .await?;
        reply.try_into()
    }
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("name", &self.endpoint.config.name)
            .field("base_url", &self.endpoint.config.base_url)
            .field("explicit_key", &self.endpoint.has_explicit_key())
            .finish()
    }
}
