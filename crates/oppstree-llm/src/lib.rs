//! Chat-completion clients for the synthesis pipeline.
//!
//! Two wire formats are supported: OpenAI-compatible `/chat/completions`
//! and the native Anthropic Messages API. A model string such as
//! `"groq/llama-3.3-70b-versatile"` is resolved by [`ProviderRouter`] to a
//! [`Provider`] and a bare model name; the provider answers every
//! [`ChatRequest`] with a [`Completion`].
//!
//! ```rust,ignore
//! let route = ProviderRouter::with_builtins().route("openai/gpt-4o").unwrap();
//! let request = ChatRequest::new(route.model, vec![
//!     ChatMessage::system("Return JSON only."),
//!     ChatMessage::user("<sources>...</sources>"),
//! ]);
//! let completion = route.provider.complete(&request).await?;
//! ```

pub mod anthropic;
pub mod config;
pub mod error;
mod http;
pub mod openai_compat;
pub mod provider;
pub mod router;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use config::{LlmProviderConfig, builtin_providers, merge_providers};
pub use error::{ProviderError, Result};
pub use openai_compat::OpenAiCompatProvider;
pub use oppstree_types::ProviderApi;
pub use provider::{Provider, connect};
pub use router::{ProviderRouter, Route};
pub use types::{ChatMessage, ChatRequest, Completion, FinishReason, Role, TokenUsage};
