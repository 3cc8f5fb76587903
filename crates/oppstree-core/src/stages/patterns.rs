//! Level 3: cross-source pattern synthesis.

use serde_json::Value;
use tracing::{info, warn};

use oppstree_types::{
    CategoryRegistry, ExtractedInsight, Pattern, PatternEvidence, PipelineConfig, Severity, Source,
    source::count_by_category,
};

use super::call_model;
use crate::error::{Result, Stage};
use crate::generator::TextGenerator;
use crate::prompts;
use crate::response::{
    Shape, array_field, bool_field, f64_field, parse_response, str_field, u32_field,
};
use crate::scoring::{SourceIndex, repair_pattern};
use crate::serializer::insights_context;

/// One call over all insights; patterns come back repaired against
/// `sources`.
pub async fn find_patterns(
    generator: &dyn TextGenerator,
    sources: &[Source],
    insights: &[ExtractedInsight],
    registry: &CategoryRegistry,
    pipeline: &PipelineConfig,
) -> Result<Vec<Pattern>> {
    let context = insights_context(insights, registry, pipeline.max_chars_per_source);
    let user = prompts::pattern_user(
        sources.len(),
        &count_by_category(sources),
        registry,
        &context,
    );

    let raw = call_model(
        generator,
        Stage::Patterns,
        prompts::PATTERN_SYSTEM,
        &user,
        pipeline.call_timeout_secs,
    )
    .await?;

    let patterns = parse_patterns(&raw, sources, registry)?;
    info!(
        patterns = patterns.len(),
        cross_org = patterns.iter().filter(|p| p.cross_org_signal).count(),
        "patterns identified"
    );
    Ok(patterns)
}

/// Parse and repair a pattern reply. Unnamed patterns are skipped.
pub fn parse_patterns(
    raw: &str,
    sources: &[Source],
    registry: &CategoryRegistry,
) -> Result<Vec<Pattern>> {
    let value = parse_response(Stage::Patterns, raw, Shape::Array)?;
    let index = SourceIndex::new(sources);

    let mut patterns = Vec::new();
    for item in value.as_array().map(Vec::as_slice).unwrap_or(&[]) {
        let name = str_field(item, "name");
        if name.is_empty() {
            warn!("skipping pattern without a name");
            continue;
        }
        let pattern = Pattern {
            name,
            description: str_field(item, "description"),
            frequency: u32_field(item, "frequency"),
            severity: Severity::from_label(&str_field(item, "severity")),
            weighted_score: f64_field(item, "weighted_score"),
            business_impact: str_field(item, "business_impact"),
            cross_org_signal: bool_field(item, "cross_org_signal"),
            evidence: array_field(item, "evidence")
                .iter()
                .filter_map(parse_evidence)
                .collect(),
            source_breakdown: Default::default(),
        };
        patterns.push(repair_pattern(pattern, &index, registry));
    }
    Ok(patterns)
}

fn parse_evidence(value: &Value) -> Option<PatternEvidence> {
    let source_id = str_field(value, "source_id");
    if source_id.is_empty() {
        return None;
    }
    let quote = match str_field(value, "quote") {
        q if q.is_empty() => str_field(value, "evidence"),
        q => q,
    };
    Some(PatternEvidence {
        source_id,
        category: str_field(value, "category"),
        weight: f64_field(value, "weight"),
        quote,
    })
}
