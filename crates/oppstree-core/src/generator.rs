//! The text-generation boundary.
//!
//! The pipeline only ever sees a [`TextGenerator`]: system instruction and
//! user prompt in, raw text plus a stop reason out. [`ProviderGenerator`]
//! adapts an `oppstree-llm` [`Provider`] to it; tests inject scripted
//! generators.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use oppstree_llm::{
    ChatMessage, ChatRequest, FinishReason, Provider, ProviderError, ProviderRouter,
    builtin_providers, merge_providers,
};
use oppstree_types::Config;

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The model finished on its own.
    #[default]
    Complete,
    /// The model hit the output token cap; the text is cut off.
    MaxTokens,
    /// Anything else the provider reported.
    Other,
}

impl From<Option<&FinishReason>> for StopReason {
    fn from(finish: Option<&FinishReason>) -> Self {
        match finish {
            None | Some(FinishReason::Stop) => Self::Complete,
            Some(FinishReason::Length) => Self::MaxTokens,
            Some(FinishReason::Other(_)) => Self::Other,
        }
    }
}

/// One generator reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub stop: StopReason,
}

impl Generation {
    /// A reply that finished normally.
    pub fn complete(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            stop: StopReason::Complete,
        }
    }

    /// A reply cut off at the token cap.
    pub fn truncated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            stop: StopReason::MaxTokens,
        }
    }
}

/// Errors crossing the generator boundary.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// The underlying LLM provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// No provider could be resolved for the configured model.
    #[error("no provider for model '{0}'")]
    NoProvider(String),

    /// Any other generator failure.
    #[error("{0}")]
    Other(String),
}

impl GeneratorError {
    /// Whether the same call could succeed later (rate limits, timeouts,
    /// 5xx). Runs are not retried; this only feeds logging.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_transient())
    }
}

/// `(system, user) → text`. Implementations must be shareable across
/// concurrent extraction batches.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, GeneratorError>;
}

/// Adapts an LLM [`Provider`] into a [`TextGenerator`].
pub struct ProviderGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: u32,
    temperature: Option<f64>,
}

impl ProviderGenerator {
    /// Wrap a provider for a bare (prefix-stripped) model name.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Resolve `config.model` through the provider router (built-ins merged
    /// with `config.providers`).
    pub fn from_config(config: &Config) -> Result<Self, GeneratorError> {
        let providers = merge_providers(builtin_providers(), &config.providers)?;
        let router = ProviderRouter::from_configs(providers);
        let route = router
            .route(&config.model)
            .ok_or_else(|| GeneratorError::NoProvider(config.model.clone()))?;

        debug!(
            provider = %route.provider.name(),
            model = %route.model,
            "resolved text generator"
        );

        Ok(Self::new(route.provider, route.model, config.pipeline.max_output_tokens)
            .with_temperature(config.pipeline.temperature))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for ProviderGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, GeneratorError> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![ChatMessage::system(system), ChatMessage::user(user)],
        )
        .with_max_tokens(self.max_tokens)
        .with_temperature(self.temperature);

        let completion = self.provider.complete(&request).await?;

        if let Some(usage) = completion.usage {
            debug!(
                provider = %self.provider.name(),
                input_tokens = usage.input,
                output_tokens = usage.output,
                "generation usage"
            );
        }

        Ok(Generation {
            stop: StopReason::from(completion.finish.as_ref()),
            text: completion.text,
        })
    }
}

impl std::fmt::Debug for ProviderGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderGenerator")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
