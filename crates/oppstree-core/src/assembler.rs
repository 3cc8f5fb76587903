//! Final merge of the mapping output with source-derived indexes.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use oppstree_types::{
    CategoryRegistry, CategorySummary, EvidenceEntry, OstResult, Source, SourcesSummary,
};

use crate::stages::mapping::MappingOutput;

/// One entry per source, in input order.
pub fn evidence_index(sources: &[Source], registry: &CategoryRegistry) -> Vec<EvidenceEntry> {
    sources
        .iter()
        .map(|s| EvidenceEntry {
            id: s.id.clone(),
            filename: s.filename.clone(),
            category: s.category.clone(),
            category_label: registry.label(&s.category).to_string(),
        })
        .collect()
}

/// Per-category source counts. Every configured category is present.
pub fn sources_summary(sources: &[Source], registry: &CategoryRegistry) -> SourcesSummary {
    let mut by_category: BTreeMap<String, CategorySummary> = registry
        .iter()
        .map(|c| {
            (
                c.key.clone(),
                CategorySummary {
                    count: 0,
                    label: c.label.clone(),
                },
            )
        })
        .collect();

    for s in sources {
        by_category
            .entry(s.category.clone())
            .or_insert_with(|| CategorySummary {
                count: 0,
                label: registry.label(&s.category).to_string(),
            })
            .count += 1;
    }

    SourcesSummary {
        total: sources.len(),
        by_category,
    }
}

/// Build the run's result. Pure apart from the values passed in.
pub fn assemble(
    run_id: String,
    generated_at: DateTime<Utc>,
    mapping: MappingOutput,
    sources: &[Source],
    registry: &CategoryRegistry,
    elapsed: Duration,
) -> OstResult {
    OstResult {
        run_id,
        generated_at,
        desired_outcomes: mapping.desired_outcomes,
        cross_cutting_themes: mapping.cross_cutting_themes,
        evidence_index: evidence_index(sources, registry),
        sources_summary: sources_summary(sources, registry),
        processing_time_secs: elapsed.as_secs_f64(),
    }
}
