//! Error types for configuration and source construction.

use thiserror::Error;

/// Errors raised while validating configuration or building sources.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    Invalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A source referenced a category that is not configured.
    #[error("unknown source category: {category}")]
    UnknownCategory {
        /// The offending category key.
        category: String,
    },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// A convenience type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
