//! Provider configuration types and built-in provider definitions.
//!
//! Each [`LlmProviderConfig`] describes how to connect to an LLM provider:
//! the wire protocol, base URL, API key environment variable, model prefix
//! for routing, and any extra headers needed.

use std::collections::HashMap;
use std::time::Duration;

use oppstree_types::{ProviderApi, ProviderConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, Result};

/// Request timeout used when a provider sets none.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for a single LLM provider endpoint.
///
/// Named apart from [`oppstree_types::ProviderConfig`], the user-facing
/// override entry that [`merge_providers`] folds into this one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmProviderConfig {
    /// Human-readable provider name (e.g. "openai", "anthropic").
    pub name: String,

    /// Wire protocol spoken by the endpoint.
    #[serde(default)]
    pub api: ProviderApi,

    /// Base URL for the API (e.g. "https://api.openai.com/v1").
    pub base_url: String,

    /// Environment variable that holds the API key (e.g. "OPENAI_API_KEY").
    pub api_key_env: String,

    /// Prefix used for routing model names to this provider (e.g. "openai/").
    /// A model string like "openai/gpt-4o" is routed to this provider and the
    /// prefix is stripped before sending the request.
    #[serde(default)]
    pub model_prefix: Option<String>,

    /// Default model to use when none is specified.
    #[serde(default)]
    pub default_model: Option<String>,

    /// Extra HTTP headers to include in every request to this provider.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Request timeout in seconds. Defaults to [`DEFAULT_TIMEOUT_SECS`].
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl LlmProviderConfig {
    fn openai_compat(name: &str, base_url: &str, api_key_env: &str) -> Self {
        Self {
            name: name.into(),
            api: ProviderApi::OpenAi,
            base_url: base_url.into(),
            api_key_env: api_key_env.into(),
            model_prefix: Some(format!("{name}/")),
            default_model: None,
            headers: HashMap::new(),
            timeout_secs: None,
        }
    }

    fn with_default_model(mut self, model: &str) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// The effective request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

/// Returns the built-in provider configurations.
///
/// The first entry is the router's default provider.
pub fn builtin_providers() -> Vec<LlmProviderConfig> {
    vec![
        LlmProviderConfig {
            name: "anthropic".into(),
            api: ProviderApi::Anthropic,
            base_url: "https://api.anthropic.com/v1".into(),
            api_key_env: "ANTHROPIC_API_KEY".into(),
            model_prefix: Some("anthropic/".into()),
            default_model: Some("claude-opus-4-6".into()),
            headers: HashMap::new(),
            timeout_secs: None,
        },
        LlmProviderConfig::openai_compat("openai", "https://api.openai.com/v1", "OPENAI_API_KEY")
            .with_default_model("gpt-4o"),
        LlmProviderConfig::openai_compat(
            "groq",
            "https://api.groq.com/openai/v1",
            "GROQ_API_KEY",
        )
        .with_default_model("llama-3.1-70b-versatile"),
        LlmProviderConfig::openai_compat(
            "deepseek",
            "https://api.deepseek.com/v1",
            "DEEPSEEK_API_KEY",
        )
        .with_default_model("deepseek-chat"),
        LlmProviderConfig::openai_compat(
            "mistral",
            "https://api.mistral.ai/v1",
            "MISTRAL_API_KEY",
        )
        .with_default_model("mistral-large-latest"),
        LlmProviderConfig::openai_compat(
            "openrouter",
            "https://openrouter.ai/api/v1",
            "OPENROUTER_API_KEY",
        ),
        LlmProviderConfig::openai_compat(
            "gemini",
            "https://generativelanguage.googleapis.com/v1beta/openai",
            "GOOGLE_GEMINI_API_KEY",
        )
        .with_default_model("gemini-2.5-flash"),
    ]
}

/// Fold user provider entries into a base list.
///
/// An entry naming an existing provider overrides the fields it sets and
/// merges its headers. A new name appends a provider; it must set
/// `base_url`, and its key variable and prefix default to
/// `<NAME>_API_KEY` and `<name>/`.
///
/// # Errors
///
/// Returns [`ProviderError::InvalidConfig`] for a new provider without a
/// base URL.
pub fn merge_providers(
    mut base: Vec<LlmProviderConfig>,
    overrides: &[ProviderConfig],
) -> Result<Vec<LlmProviderConfig>> {
    for entry in overrides {
        if let Some(existing) = base.iter_mut().find(|p| p.name == entry.name) {
            apply_override(existing, entry);
            continue;
        }
        let base_url = entry.base_url.clone().ok_or_else(|| {
            ProviderError::InvalidConfig(format!("provider '{}' needs a base_url", entry.name))
        })?;
        let mut added = LlmProviderConfig::openai_compat(
            &entry.name,
            &base_url,
            &format!("{}_API_KEY", entry.name.to_uppercase().replace('-', "_")),
        );
        apply_override(&mut added, entry);
        base.push(added);
    }
    Ok(base)
}

fn apply_override(target: &mut LlmProviderConfig, entry: &ProviderConfig) {
    if let Some(api) = entry.api {
        target.api = api;
    }
    if let Some(ref url) = entry.base_url {
        target.base_url = url.clone();
    }
    if let Some(ref env) = entry.api_key_env {
        target.api_key_env = env.clone();
    }
    if let Some(ref prefix) = entry.model_prefix {
        target.model_prefix = Some(prefix.clone());
    }
    if let Some(ref model) = entry.default_model {
        target.default_model = Some(model.clone());
    }
    if entry.timeout_secs.is_some() {
        target.timeout_secs = entry.timeout_secs;
    }
    target
        .headers
        .extend(entry.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
}
