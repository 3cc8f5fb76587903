//! Configuration schema types.
//!
//! Every struct accepts both `snake_case` and `camelCase` field names in
//! JSON via `#[serde(alias)]`. Unknown fields are ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::category::CategoryRegistry;
use crate::error::{ConfigError, Result};

// ── Root config ──────────────────────────────────────────────────────────

/// Root configuration for oppstree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Routed model identifier, `provider/model`.
    #[serde(default = "default_model")]
    pub model: String,

    /// Provider entries merged over the built-in provider table.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Batching, budgets and limits for a synthesis run.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Ordered source categories and their weights.
    #[serde(default)]
    pub categories: CategoryRegistry,
}

fn default_model() -> String {
    "anthropic/claude-opus-4-6".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            providers: Vec::new(),
            pipeline: PipelineConfig::default(),
            categories: CategoryRegistry::default(),
        }
    }
}

impl Config {
    /// Check the whole configuration before a run.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::invalid("model must not be empty"));
        }
        for p in &self.providers {
            if p.name.trim().is_empty() {
                return Err(ConfigError::invalid("provider name must not be empty"));
            }
        }
        self.pipeline.validate()?;
        self.categories.validate()
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// Tuning for a synthesis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Sources per extraction call.
    #[serde(default = "default_batch_size", alias = "batchSize")]
    pub batch_size: usize,

    /// Characters kept per source when sources are built.
    #[serde(default = "default_max_chars_per_source", alias = "maxCharsPerSource")]
    pub max_chars_per_source: usize,

    /// Output token cap per generator call.
    #[serde(default = "default_max_output_tokens", alias = "maxOutputTokens")]
    pub max_output_tokens: u32,

    /// Sampling temperature. Provider default when unset.
    #[serde(default)]
    pub temperature: Option<f64>,

    /// Extraction batches in flight at once.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Upper bound on one generator call, in seconds.
    #[serde(default = "default_call_timeout_secs", alias = "callTimeoutSecs")]
    pub call_timeout_secs: u64,

    /// Most desired-outcome statements a run accepts.
    #[serde(default = "default_max_desired_outcomes", alias = "maxDesiredOutcomes")]
    pub max_desired_outcomes: usize,
}

fn default_batch_size() -> usize {
    10
}
fn default_max_chars_per_source() -> usize {
    16_000
}
fn default_max_output_tokens() -> u32 {
    16_384
}
fn default_parallelism() -> usize {
    1
}
fn default_call_timeout_secs() -> u64 {
    300
}
fn default_max_desired_outcomes() -> usize {
    3
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_chars_per_source: default_max_chars_per_source(),
            max_output_tokens: default_max_output_tokens(),
            temperature: None,
            parallelism: default_parallelism(),
            call_timeout_secs: default_call_timeout_secs(),
            max_desired_outcomes: default_max_desired_outcomes(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size must be at least 1"));
        }
        if self.parallelism == 0 {
            return Err(ConfigError::invalid("parallelism must be at least 1"));
        }
        if self.max_chars_per_source == 0 {
            return Err(ConfigError::invalid(
                "max_chars_per_source must be at least 1",
            ));
        }
        if self.max_output_tokens == 0 {
            return Err(ConfigError::invalid("max_output_tokens must be at least 1"));
        }
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::invalid("call_timeout_secs must be at least 1"));
        }
        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ConfigError::invalid(format!(
                "temperature {t} is outside 0.0..=2.0"
            )));
        }
        Ok(())
    }
}

// ── Providers ────────────────────────────────────────────────────────────

/// Wire protocol spoken by a provider endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderApi {
    /// OpenAI chat-completions format.
    #[default]
    #[serde(alias = "openai_compat", alias = "openai-compat")]
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

/// A user-supplied provider entry.
///
/// An entry whose `name` matches a built-in provider overrides only the
/// fields it sets; any other name adds a provider and must set `base_url`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub name: String,

    #[serde(default, alias = "baseUrl")]
    pub base_url: Option<String>,

    /// Environment variable holding the API key.
    #[serde(default, alias = "apiKeyEnv")]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub api: Option<ProviderApi>,

    /// Routing prefix, e.g. "local/".
    #[serde(default, alias = "modelPrefix")]
    pub model_prefix: Option<String>,

    #[serde(default, alias = "defaultModel")]
    pub default_model: Option<String>,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default, alias = "timeoutSecs")]
    pub timeout_secs: Option<u64>,
}
