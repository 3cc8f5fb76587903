//! Errors raised by provider calls.

use thiserror::Error;

/// Why a provider call did not produce a completion.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The key variable for this provider is unset.
    #[error("{provider}: no API key, set {env_var}")]
    MissingApiKey { provider: String, env_var: String },

    /// A provider entry cannot be turned into a working endpoint.
    #[error("invalid provider config: {0}")]
    InvalidConfig(String),

    /// HTTP 401/403.
    #[error("credentials rejected: {0}")]
    Unauthorized(String),

    /// HTTP 429 with no sign of an exhausted account.
    #[error("rate limited, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Out of credit. Some providers report this as a 429.
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// HTTP 404 for the requested model.
    #[error("unknown model '{model}': {detail}")]
    UnknownModel { model: String, detail: String },

    /// Any other non-success status.
    #[error("provider returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    /// A 2xx reply whose body is not the expected shape.
    #[error("unreadable provider reply: {0}")]
    Malformed(String),

    /// The HTTP client gave up waiting.
    #[error("provider did not answer in time")]
    Timeout,

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ProviderError {
    /// Whether trying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout | Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_names_provider_and_variable() {
        let err = ProviderError::MissingApiKey {
            provider: "anthropic".into(),
            env_var: "ANTHROPIC_API_KEY".into(),
        };
        assert_eq!(
            err.to_string(),
            "anthropic: no API key, set ANTHROPIC_API_KEY"
        );
    }

    #[test]
    fn unknown_model_message() {
        let err = ProviderError::UnknownModel {
            model: "gpt-9".into(),
            detail: "no such model".into(),
        };
        assert_eq!(err.to_string(), "unknown model 'gpt-9': no such model");
    }

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::RateLimited { retry_after_ms: 10 }.is_transient());
        assert!(
            ProviderError::Status {
                status: 503,
                detail: String::new()
            }
            .is_transient()
        );
        assert!(
            !ProviderError::Status {
                status: 400,
                detail: String::new()
            }
            .is_transient()
        );
        assert!(!ProviderError::Unauthorized("x".into()).is_transient());
        assert!(!ProviderError::QuotaExhausted("x".into()).is_transient());
    }
}
