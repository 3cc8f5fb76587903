//! Model string → provider resolution.
//!
//! `"groq/llama-3.3-70b"` goes to the provider whose `model_prefix` is
//! `"groq/"`, with the prefix removed. A string matching no prefix goes,
//! unchanged, to the first configured provider. When nothing is left after
//! the prefix (`"openai/"`, or an empty string) the provider's
//! `default_model` fills in.

use std::sync::Arc;

use crate::config::{LlmProviderConfig, builtin_providers};
use crate::provider::{Provider, connect};

/// A resolved model: where to send it and under which name.
#[derive(Clone)]
pub struct Route {
    pub provider: Arc<dyn Provider>,
    pub model: String,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider.name(), self.model)
    }
}

struct Entry {
    prefix: Option<String>,
    default_model: Option<String>,
    provider: Arc<dyn Provider>,
}

/// Providers in configuration order. The first one is the fallback.
pub struct ProviderRouter {
    entries: Vec<Entry>,
}

impl ProviderRouter {
    pub fn from_configs(configs: Vec<LlmProviderConfig>) -> Self {
        let entries = configs
            .into_iter()
            .map(|config| Entry {
                prefix: config.model_prefix.clone().filter(|p| !p.is_empty()),
                default_model: config.default_model.clone(),
                provider: connect(config),
            })
            .collect();
        Self { entries }
    }

    pub fn with_builtins() -> Self {
        Self::from_configs(builtin_providers())
    }

    /// `None` when there are no providers, or when the model name is empty
    /// and the chosen provider has no default model.
    pub fn route(&self, model: &str) -> Option<Route> {
        let model = model.trim();

        let by_prefix = self
            .entries
            .iter()
            .filter_map(|entry| {
                let prefix = entry.prefix.as_deref()?;
                let rest = model.strip_prefix(prefix)?;
                Some((prefix.len(), entry, rest))
            })
            .max_by_key(|(len, _, _)| *len);

        let (entry, bare) = match by_prefix {
            Some((_, entry, rest)) => (entry, rest),
            None => (self.entries.first()?, model),
        };

        let model = if bare.is_empty() {
            entry.default_model.clone()?
        } else {
            bare.to_string()
        };

        Some(Route {
            provider: Arc::clone(&entry.provider),
            model,
        })
    }

    /// Provider names in configuration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.provider.name()).collect()
    }
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for entry in &self.entries {
            list.entry(&(entry.provider.name(), entry.prefix.as_deref()));
        }
        list.finish()
    }
}
