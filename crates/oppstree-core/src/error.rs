//! Error taxonomy for a synthesis run.
//!
//! Every failure that happens inside a stage names that stage. Input
//! validation errors are raised before any stage runs.

use oppstree_types::ConfigError;
use thiserror::Error;

use crate::generator::GeneratorError;

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Per-source insight extraction (level 2).
    Extraction,
    /// Cross-source pattern synthesis (level 3).
    Patterns,
    /// Opportunity mapping (level 4).
    Mapping,
    /// Result assembly.
    Assembly,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Patterns => "patterns",
            Self::Mapping => "mapping",
            Self::Assembly => "assembly",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a synthesis run.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SynthesisError {
    /// The run was given no sources.
    #[error("no sources to synthesize")]
    NoSources,

    /// More desired-outcome statements than the run accepts.
    #[error("{given} desired outcomes given; at most {max} are accepted")]
    TooManyOutcomes { given: usize, max: usize },

    /// A source carries a category that is not configured.
    #[error("source {source_id} has unknown category {category}")]
    UnknownCategory { source_id: String, category: String },

    /// Two sources share an id.
    #[error("duplicate source id: {0}")]
    DuplicateSourceId(String),

    /// The model's text was not one JSON value of the expected shape.
    #[error("{stage} stage: malformed model response: {reason}")]
    MalformedResponse { stage: Stage, reason: String },

    /// The model stopped at its output token cap.
    #[error(
        "{stage} stage: model output was truncated at the token limit; \
         reduce the batch size or the number of sources"
    )]
    OutputTruncated { stage: Stage },

    /// A generator call exceeded the configured timeout.
    #[error("{stage} stage: model call timed out after {timeout_secs}s")]
    Timeout { stage: Stage, timeout_secs: u64 },

    /// The generator itself failed (transport, auth, rate limit).
    #[error("{stage} stage: generator failed: {source}")]
    Generator {
        stage: Stage,
        #[source]
        source: GeneratorError,
    },

    /// The run's cancellation token fired.
    #[error("run cancelled before {stage} stage")]
    Cancelled { stage: Stage },

    /// Configuration rejected before the run.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SynthesisError {
    /// The stage this error is attributed to, if it arose inside one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::MalformedResponse { stage, .. }
            | Self::OutputTruncated { stage }
            | Self::Timeout { stage, .. }
            | Self::Generator { stage, .. }
            | Self::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }

    pub(crate) fn malformed(stage: Stage, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            stage,
            reason: reason.into(),
        }
    }
}

/// A convenience type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, SynthesisError>;
