//! Level 2: per-source insight extraction.
//!
//! Sources are split into batches of at most `batch_size` so that the
//! worst-case reply stays under the output token budget. Batches are
//! independent: up to `parallelism` of them are in flight at once, each
//! result is tagged with its batch index, and the merge restores input
//! order.

use std::collections::HashSet;

use futures_util::StreamExt;
use futures_util::stream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use oppstree_types::{
    CategoryRegistry, ExtractedInsight, PainPoint, PipelineConfig, Problem, Severity, Source,
};

use super::call_model;
use crate::error::{Result, Stage, SynthesisError};
use crate::generator::TextGenerator;
use crate::prompts;
use crate::response::{Shape, array_field, parse_response, str_field, str_list};
use crate::scoring::SourceIndex;
use crate::serializer::sources_context;

/// Run extraction over every source.
///
/// `on_batch(done, total)` fires once per finished batch. The first failing
/// batch aborts the stage; batches not yet started are never sent.
pub async fn extract_insights(
    generator: &dyn TextGenerator,
    sources: &[Source],
    registry: &CategoryRegistry,
    pipeline: &PipelineConfig,
    cancel: Option<&CancellationToken>,
    on_batch: &(dyn Fn(usize, usize) + Send + Sync),
) -> Result<Vec<ExtractedInsight>> {
    let batch_size = pipeline.batch_size.max(1);
    let batches: Vec<&[Source]> = sources.chunks(batch_size).collect();
    let total = batches.len();

    info!(
        sources = sources.len(),
        batches = total,
        parallelism = pipeline.parallelism,
        "extracting insights"
    );

    let mut results = stream::iter(batches.into_iter().enumerate())
        .map(|(idx, batch)| async move {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(SynthesisError::Cancelled {
                    stage: Stage::Extraction,
                });
            }
            debug!(batch = idx + 1, of = total, sources = batch.len(), "sending batch");
            let context = sources_context(batch, registry, pipeline.max_chars_per_source);
            let raw = call_model(
                generator,
                Stage::Extraction,
                prompts::EXTRACTION_SYSTEM,
                &prompts::extraction_user(&context),
                pipeline.call_timeout_secs,
            )
            .await?;
            let insights = parse_insights(&raw, batch)?;
            Ok((idx, insights))
        })
        .buffer_unordered(pipeline.parallelism.max(1));

    let mut per_batch: Vec<Vec<ExtractedInsight>> = vec![Vec::new(); total];
    let mut done = 0;
    while let Some(result) = results.next().await {
        let (idx, insights) = result?;
        debug!(batch = idx + 1, insights = insights.len(), "batch parsed");
        per_batch[idx] = insights;
        done += 1;
        on_batch(done, total);
    }

    Ok(merge(per_batch, sources))
}

/// Flatten batch results, keep the first record per source and order by
/// source position.
fn merge(per_batch: Vec<Vec<ExtractedInsight>>, sources: &[Source]) -> Vec<ExtractedInsight> {
    let index = SourceIndex::new(sources);
    let mut seen = HashSet::new();
    let mut merged: Vec<ExtractedInsight> = per_batch
        .into_iter()
        .flatten()
        .filter(|insight| seen.insert(insight.source_id.clone()))
        .collect();
    merged.sort_by_key(|insight| index.position(&insight.source_id).unwrap_or(usize::MAX));
    merged
}

/// Parse one batch reply. Records are only accepted for sources that were
/// in the batch; category always comes from the source.
pub fn parse_insights(raw: &str, batch: &[Source]) -> Result<Vec<ExtractedInsight>> {
    let value = parse_response(Stage::Extraction, raw, Shape::Array)?;
    let index = SourceIndex::new(batch);
    let mut seen = HashSet::new();
    let mut insights = Vec::new();

    for item in value.as_array().map(Vec::as_slice).unwrap_or(&[]) {
        if !item.is_object() {
            warn!("skipping non-object insight record");
            continue;
        }
        let source_id = str_field(item, "source_id");
        let Some(source) = index.get(&source_id) else {
            warn!(source_id = %source_id, "dropping insight for a source not in the batch");
            continue;
        };
        if !seen.insert(source.id.clone()) {
            debug!(source_id = %source_id, "duplicate insight record ignored");
            continue;
        }

        insights.push(ExtractedInsight {
            source_id: source.id.clone(),
            category: source.category.clone(),
            problems: array_field(item, "problems")
                .iter()
                .filter_map(parse_problem)
                .collect(),
            jobs_to_be_done: str_list(item, "jobs_to_be_done"),
            pain_points: array_field(item, "pain_points")
                .iter()
                .filter_map(parse_pain_point)
                .collect(),
            desired_outcomes: str_list(item, "desired_outcomes"),
            solution_requests: str_list(item, "solution_requests"),
        });
    }

    Ok(insights)
}

fn parse_problem(value: &Value) -> Option<Problem> {
    if let Some(text) = value.as_str() {
        let text = text.trim();
        return (!text.is_empty()).then(|| Problem {
            description: text.to_string(),
            ..Default::default()
        });
    }
    let description = str_field(value, "description");
    if description.is_empty() {
        return None;
    }
    Some(Problem {
        description,
        severity: Severity::from_label(&str_field(value, "severity")),
        evidence: str_field(value, "evidence"),
    })
}

fn parse_pain_point(value: &Value) -> Option<PainPoint> {
    if let Some(text) = value.as_str() {
        let text = text.trim();
        return (!text.is_empty()).then(|| PainPoint {
            description: text.to_string(),
            ..Default::default()
        });
    }
    let description = str_field(value, "description");
    if description.is_empty() {
        return None;
    }
    Some(PainPoint {
        description,
        severity: Severity::from_label(&str_field(value, "severity")),
    })
}
