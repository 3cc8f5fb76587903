//! Cross-source patterns (pyramid level 3).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::category::CategoryBreakdown;
use crate::insight::Severity;

/// One source's contribution to a pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatternEvidence {
    pub source_id: String,
    pub category: String,
    pub weight: f64,
    /// Quote or summary from the source.
    #[serde(default)]
    pub quote: String,
}

/// A recurring theme found across sources.
///
/// `frequency` is the number of distinct source ids in `evidence` and
/// `weighted_score` the sum of those sources' weights. Both arrive from
/// the model and are recomputed before the pattern leaves the pattern
/// stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Pattern {
    pub name: String,
    pub description: String,
    pub frequency: u32,
    pub severity: Severity,
    pub weighted_score: f64,
    #[serde(default)]
    pub business_impact: String,
    /// True iff the evidence spans two or more categories.
    pub cross_org_signal: bool,
    #[serde(default)]
    pub evidence: Vec<PatternEvidence>,
    /// Category key → number of evidencing sources.
    #[serde(default)]
    pub source_breakdown: CategoryBreakdown,
}

impl Pattern {
    /// Distinct source ids in the evidence list.
    pub fn source_ids(&self) -> BTreeSet<&str> {
        self.evidence.iter().map(|e| e.source_id.as_str()).collect()
    }

    /// Distinct categories in the evidence list.
    pub fn categories(&self) -> BTreeSet<&str> {
        self.evidence.iter().map(|e| e.category.as_str()).collect()
    }
}
