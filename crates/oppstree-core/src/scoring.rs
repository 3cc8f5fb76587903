//! Deterministic scoring and attribution repair.
//!
//! Model output carries its own counts, scores and breakdowns. None of
//! them are trusted: every figure that can be derived from evidence is
//! recomputed from the run's sources and the configured weights.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use oppstree_types::{
    CategoryBreakdown, CategoryRegistry, CrossCuttingTheme, EvidenceStrength, Opportunity,
    Pattern, PatternEvidence, Source,
};

/// Id → source lookup that also remembers input order.
pub struct SourceIndex<'a> {
    by_id: HashMap<&'a str, (usize, &'a Source)>,
}

impl<'a> SourceIndex<'a> {
    pub fn new(sources: &'a [Source]) -> Self {
        let mut by_id = HashMap::with_capacity(sources.len());
        for (pos, source) in sources.iter().enumerate() {
            by_id.entry(source.id.as_str()).or_insert((pos, source));
        }
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<&'a Source> {
        self.by_id.get(id).map(|(_, s)| *s)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).map(|(pos, _)| *pos)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Figures derived from a set of distinct source ids.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceScore {
    pub source_count: u32,
    pub weighted_score: f64,
    pub breakdown: CategoryBreakdown,
    pub category_count: usize,
}

/// Score the distinct known ids in `ids`. Unknown ids are ignored.
pub fn score_sources<'s>(
    ids: impl IntoIterator<Item = &'s str>,
    index: &SourceIndex<'_>,
    registry: &CategoryRegistry,
) -> EvidenceScore {
    let mut seen = HashSet::new();
    let mut categories = BTreeSet::new();
    let mut breakdown = registry.empty_breakdown();
    let mut weighted_score = 0.0;

    for id in ids {
        let Some(source) = index.get(id) else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        weighted_score += source.weight;
        categories.insert(source.category.as_str());
        *breakdown.entry(source.category.clone()).or_insert(0) += 1;
    }

    EvidenceScore {
        source_count: seen.len() as u32,
        weighted_score,
        breakdown,
        category_count: categories.len(),
    }
}

/// Zero-fill `partial` over the registry; keys outside it are dropped.
pub fn complete_breakdown(
    partial: impl IntoIterator<Item = (String, u32)>,
    registry: &CategoryRegistry,
) -> CategoryBreakdown {
    let mut breakdown = registry.empty_breakdown();
    for (key, count) in partial {
        match breakdown.get_mut(&key) {
            Some(slot) => *slot = count,
            None => debug!(category = %key, "dropping breakdown entry for unknown category"),
        }
    }
    breakdown
}

/// Rebuild a pattern's evidence and figures from the run's sources.
///
/// Evidence for unknown sources is dropped. Repeated evidence for one
/// source keeps the first quote. Category and weight always come from the
/// source itself.
pub fn repair_pattern(
    mut pattern: Pattern,
    index: &SourceIndex<'_>,
    registry: &CategoryRegistry,
) -> Pattern {
    let reported_frequency = pattern.frequency;
    let mut seen = HashSet::new();
    let mut evidence = Vec::with_capacity(pattern.evidence.len());

    for ev in pattern.evidence.drain(..) {
        let Some(source) = index.get(&ev.source_id) else {
            warn!(
                pattern = %pattern.name,
                source_id = %ev.source_id,
                "dropping pattern evidence for unknown source"
            );
            continue;
        };
        if !seen.insert(source.id.clone()) {
            continue;
        }
        evidence.push(PatternEvidence {
            source_id: source.id.clone(),
            category: source.category.clone(),
            weight: source.weight,
            quote: ev.quote,
        });
    }

    let score = score_sources(evidence.iter().map(|e| e.source_id.as_str()), index, registry);
    if score.source_count == 0 {
        warn!(pattern = %pattern.name, "pattern has no attributable evidence");
    } else if score.source_count != reported_frequency {
        debug!(
            pattern = %pattern.name,
            reported = reported_frequency,
            recomputed = score.source_count,
            "pattern frequency corrected"
        );
    }

    pattern.evidence = evidence;
    pattern.frequency = score.source_count;
    pattern.weighted_score = score.weighted_score;
    pattern.cross_org_signal = score.category_count >= 2;
    pattern.source_breakdown = score.breakdown;
    pattern
}

/// Find a pattern by name: exact first, then case-insensitive.
pub fn resolve_pattern<'p>(name: &str, patterns: &'p [Pattern]) -> Option<&'p Pattern> {
    let name = name.trim();
    patterns
        .iter()
        .find(|p| p.name == name)
        .or_else(|| patterns.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
}

/// What the model reported for an opportunity before repair.
#[derive(Debug, Clone, Default)]
pub struct ReportedFigures {
    pub evidence_strength: String,
    pub source_breakdown: Vec<(String, u32)>,
}

/// Restore attribution and recompute an opportunity's figures.
///
/// When at least one contributing pattern resolves, count, score and
/// breakdown come from the union of their evidence. Otherwise the model's
/// figures stand (already zero-defaulted) with the breakdown completed.
pub fn repair_opportunity(
    mut opp: Opportunity,
    reported: ReportedFigures,
    patterns: &[Pattern],
    index: &SourceIndex<'_>,
    registry: &CategoryRegistry,
) -> Opportunity {
    for problem in &mut opp.problems {
        if let Some(id) = &problem.source_id
            && !index.contains(id)
        {
            debug!(opportunity = %opp.name, source_id = %id, "clearing unknown problem source");
            problem.source_id = None;
        }
    }

    for solution in &mut opp.solutions {
        let mut seen = HashSet::new();
        solution
            .evidence_sources
            .retain(|id| index.contains(id) && seen.insert(id.clone()));
    }

    let mut resolved: Vec<&Pattern> = Vec::new();
    for name in &opp.contributing_patterns {
        match resolve_pattern(name, patterns) {
            Some(p) if !resolved.iter().any(|r| r.name == p.name) => resolved.push(p),
            Some(_) => {}
            None => warn!(
                opportunity = %opp.name,
                pattern = %name,
                "contributing pattern not found"
            ),
        }
    }
    opp.contributing_patterns = resolved.iter().map(|p| p.name.clone()).collect();

    if resolved.is_empty() {
        opp.source_breakdown = complete_breakdown(reported.source_breakdown, registry);
    } else {
        let score = score_sources(
            resolved
                .iter()
                .flat_map(|p| p.evidence.iter().map(|e| e.source_id.as_str())),
            index,
            registry,
        );
        opp.source_count = score.source_count;
        opp.weighted_score = score.weighted_score;
        opp.source_breakdown = score.breakdown;
    }

    opp.evidence_strength = EvidenceStrength::from_label(&reported.evidence_strength)
        .unwrap_or_else(|| EvidenceStrength::from_source_count(opp.source_count));
    opp
}

/// Clamp the percentage and complete the breakdown.
pub fn repair_theme(
    mut theme: CrossCuttingTheme,
    reported_breakdown: Vec<(String, u32)>,
    registry: &CategoryRegistry,
) -> CrossCuttingTheme {
    theme.source_percentage = clamp_percentage(theme.source_percentage);
    theme.category_breakdown = complete_breakdown(reported_breakdown, registry);
    theme
}

pub fn clamp_percentage(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
