//! Per-source extraction output (pyramid level 2).

use serde::{Deserialize, Serialize};

/// Severity of a problem, pain point or pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocking or revenue-affecting.
    High,
    /// Noticeable friction. Used when the model gives nothing usable.
    #[default]
    Medium,
    /// Minor annoyance.
    Low,
}

impl Severity {
    /// Parse a model-supplied label, case-insensitively. Anything
    /// unrecognized maps to [`Severity::Medium`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }

    /// Lowercase label as used in prompts.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something broken, painful or inefficient, with a supporting quote.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Problem {
    pub description: String,
    pub severity: Severity,
    /// Direct quote from the source.
    #[serde(default)]
    pub evidence: String,
}

/// A friction point and its severity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PainPoint {
    pub description: String,
    pub severity: Severity,
}

/// Structured insight extracted from a single source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedInsight {
    /// Id of the [`Source`](crate::Source) this was extracted from.
    pub source_id: String,

    /// Category of that source.
    pub category: String,

    #[serde(default)]
    pub problems: Vec<Problem>,

    /// "When [situation], I want to [motivation], so I can [outcome]".
    #[serde(default)]
    pub jobs_to_be_done: Vec<String>,

    #[serde(default)]
    pub pain_points: Vec<PainPoint>,

    #[serde(default)]
    pub desired_outcomes: Vec<String>,

    /// Specific asks. Recorded but not prioritized.
    #[serde(default)]
    pub solution_requests: Vec<String>,
}

impl ExtractedInsight {
    /// Whether every category list is empty.
    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
            && self.jobs_to_be_done.is_empty()
            && self.pain_points.is_empty()
            && self.desired_outcomes.is_empty()
            && self.solution_requests.is_empty()
    }
}
