//! The Opportunity Solution Tree produced by a synthesis run.
//!
//! Desired outcomes own ordered opportunities; each opportunity carries
//! its problems, jobs-to-be-done and candidate solutions, plus the
//! category breakdown the visualization layer renders. The evidence index
//! and sources summary are computed from the run's [`Source`](crate::Source)
//! list, never from model output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::CategoryBreakdown;
use crate::insight::Severity;

/// How well an opportunity is supported by evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EvidenceStrength {
    High,
    #[default]
    Medium,
    Low,
}

impl EvidenceStrength {
    /// Source count at or above which evidence is HIGH.
    pub const HIGH_MIN_SOURCES: u32 = 10;
    /// Source count at or above which evidence is MEDIUM.
    pub const MEDIUM_MIN_SOURCES: u32 = 5;

    /// Parse a model-supplied label. Returns `None` for anything other
    /// than high/medium/low in any case.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }

    /// Derive the label from how many sources support an opportunity.
    pub fn from_source_count(count: u32) -> Self {
        if count >= Self::HIGH_MIN_SOURCES {
            Self::High
        } else if count >= Self::MEDIUM_MIN_SOURCES {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl std::fmt::Display for EvidenceStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem attached to an opportunity, optionally attributed to a source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OpportunityProblem {
    pub description: String,
    /// Present only when it names a source of this run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub severity: Severity,
}

/// A candidate solution within an opportunity space.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SolutionOption {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub expected_impact: String,
    /// Effort label as given by the model (typically HIGH/MEDIUM/LOW).
    #[serde(default)]
    pub effort: String,
    /// Ids of the sources that motivate this solution.
    #[serde(default)]
    pub evidence_sources: Vec<String>,
}

/// A problem/need cluster within a desired outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Opportunity {
    pub name: String,
    pub description: String,
    pub evidence_strength: EvidenceStrength,
    pub weighted_score: f64,
    pub source_count: u32,
    /// Has an entry for every configured category.
    pub source_breakdown: CategoryBreakdown,
    #[serde(default)]
    pub problems: Vec<OpportunityProblem>,
    #[serde(default)]
    pub jobs_to_be_done: Vec<String>,
    #[serde(default)]
    pub solutions: Vec<SolutionOption>,
    /// Next validation steps.
    #[serde(default)]
    pub next_steps: Vec<String>,
    /// Names of the [`Pattern`](crate::Pattern)s this opportunity groups.
    #[serde(default)]
    pub contributing_patterns: Vec<String>,
}

/// Whether an outcome came from the user or was inferred from evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeOrigin {
    UserSpecified,
    #[default]
    Inferred,
}

/// A strategic goal and the opportunities mapped onto it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DesiredOutcome {
    pub statement: String,
    #[serde(default)]
    pub origin: OutcomeOrigin,
    #[serde(default)]
    pub opportunities: Vec<Opportunity>,
}

/// A theme spanning several opportunities.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CrossCuttingTheme {
    pub name: String,
    pub description: String,
    /// Share of sources touched, in [0, 100].
    pub source_percentage: f64,
    pub category_breakdown: CategoryBreakdown,
}

/// One row of the evidence index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceEntry {
    pub id: String,
    pub filename: String,
    pub category: String,
    pub category_label: String,
}

/// Count and label for one category in the sources summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySummary {
    pub count: usize,
    pub label: String,
}

/// Source counts per configured category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourcesSummary {
    pub total: usize,
    pub by_category: BTreeMap<String, CategorySummary>,
}

/// The complete output of a synthesis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OstResult {
    /// Identifier of the run that produced this result.
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub desired_outcomes: Vec<DesiredOutcome>,
    pub cross_cutting_themes: Vec<CrossCuttingTheme>,
    pub evidence_index: Vec<EvidenceEntry>,
    pub sources_summary: SourcesSummary,
    pub processing_time_secs: f64,
}

impl OstResult {
    /// All opportunities across outcomes, highest weighted score first.
    /// Ties keep tree order.
    pub fn opportunities(&self) -> Vec<&Opportunity> {
        let mut all: Vec<&Opportunity> = self
            .desired_outcomes
            .iter()
            .flat_map(|o| o.opportunities.iter())
            .collect();
        all.sort_by(|a, b| b.weighted_score.total_cmp(&a.weighted_score));
        all
    }

    /// The `n` highest-scoring opportunities.
    pub fn top_priorities(&self, n: usize) -> Vec<&Opportunity> {
        let mut all = self.opportunities();
        all.truncate(n);
        all
    }

    pub fn total_opportunities(&self) -> usize {
        self.desired_outcomes
            .iter()
            .map(|o| o.opportunities.len())
            .sum()
    }

    pub fn total_problems(&self) -> usize {
        self.desired_outcomes
            .iter()
            .flat_map(|o| o.opportunities.iter())
            .map(|opp| opp.problems.len())
            .sum()
    }

    pub fn total_solutions(&self) -> usize {
        self.desired_outcomes
            .iter()
            .flat_map(|o| o.opportunities.iter())
            .map(|opp| opp.solutions.len())
            .sum()
    }
}
