//! Level 4: mapping patterns onto desired outcomes and opportunity spaces.

use serde_json::Value;
use tracing::{debug, info, warn};

use oppstree_types::{
    CategoryRegistry, CrossCuttingTheme, DesiredOutcome, Opportunity, OpportunityProblem,
    OutcomeOrigin, Pattern, PipelineConfig, Severity, SolutionOption, Source,
};

use super::call_model;
use crate::error::{Result, Stage, SynthesisError};
use crate::generator::TextGenerator;
use crate::prompts;
use crate::response::{
    Shape, array_field, count_map, f64_field, parse_response, str_field, str_list, u32_field,
};
use crate::scoring::{ReportedFigures, SourceIndex, repair_opportunity, repair_theme};
use crate::serializer::patterns_context;

/// Parsed and repaired mapping reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingOutput {
    pub desired_outcomes: Vec<DesiredOutcome>,
    pub cross_cutting_themes: Vec<CrossCuttingTheme>,
}

/// One call over all patterns. `desired_outcomes` are already trimmed
/// and non-empty.
pub async fn map_opportunities(
    generator: &dyn TextGenerator,
    sources: &[Source],
    patterns: &[Pattern],
    desired_outcomes: &[String],
    registry: &CategoryRegistry,
    pipeline: &PipelineConfig,
) -> Result<MappingOutput> {
    let context = patterns_context(patterns, registry, pipeline.max_chars_per_source);
    let user = prompts::mapping_user(sources.len(), desired_outcomes, registry, &context);

    let raw = call_model(
        generator,
        Stage::Mapping,
        prompts::MAPPING_SYSTEM,
        &user,
        pipeline.call_timeout_secs,
    )
    .await?;

    let output = parse_mapping(&raw, sources, patterns, desired_outcomes, registry)?;
    info!(
        outcomes = output.desired_outcomes.len(),
        opportunities = output
            .desired_outcomes
            .iter()
            .map(|o| o.opportunities.len())
            .sum::<usize>(),
        themes = output.cross_cutting_themes.len(),
        "opportunities mapped"
    );
    Ok(output)
}

/// Parse and repair a mapping reply.
///
/// Outcomes matching a user statement (case-insensitive, trimmed) are
/// marked user-specified and take the user's wording. User statements the
/// model left out are appended with no opportunities. Opportunities are
/// ranked by weighted score; ties keep model order.
///
/// `desired_outcomes` must be an array. `cross_cutting_themes` may be
/// absent or null, but anything else in its place is malformed.
pub fn parse_mapping(
    raw: &str,
    sources: &[Source],
    patterns: &[Pattern],
    user_outcomes: &[String],
    registry: &CategoryRegistry,
) -> Result<MappingOutput> {
    let value = parse_response(Stage::Mapping, raw, Shape::Object)?;
    let index = SourceIndex::new(sources);

    let outcome_items = value
        .get("desired_outcomes")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            SynthesisError::malformed(Stage::Mapping, "expected desired_outcomes to be a JSON array")
        })?;
    let theme_items: &[Value] = match value.get("cross_cutting_themes") {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(SynthesisError::malformed(
                Stage::Mapping,
                "expected cross_cutting_themes to be a JSON array",
            ));
        }
    };

    let mut desired_outcomes: Vec<DesiredOutcome> = Vec::new();
    for item in outcome_items {
        let statement = str_field(item, "statement");
        if statement.is_empty() {
            warn!("skipping desired outcome without a statement");
            continue;
        }

        let (statement, origin) = match user_outcomes
            .iter()
            .find(|u| u.trim().eq_ignore_ascii_case(&statement))
        {
            Some(user) => (user.trim().to_string(), OutcomeOrigin::UserSpecified),
            None => (statement, OutcomeOrigin::Inferred),
        };

        let mut opportunities: Vec<Opportunity> = array_field(item, "opportunities")
            .iter()
            .filter_map(|opp| parse_opportunity(opp, patterns, &index, registry))
            .collect();
        opportunities.sort_by(|a, b| b.weighted_score.total_cmp(&a.weighted_score));

        desired_outcomes.push(DesiredOutcome {
            statement,
            origin,
            opportunities,
        });
    }

    for user in user_outcomes {
        let user = user.trim();
        if !desired_outcomes
            .iter()
            .any(|o| o.statement.eq_ignore_ascii_case(user))
        {
            debug!(outcome = %user, "model omitted a user outcome; keeping it empty");
            desired_outcomes.push(DesiredOutcome {
                statement: user.to_string(),
                origin: OutcomeOrigin::UserSpecified,
                opportunities: Vec::new(),
            });
        }
    }

    let cross_cutting_themes = theme_items
        .iter()
        .filter_map(|theme| parse_theme(theme, registry))
        .collect();

    Ok(MappingOutput {
        desired_outcomes,
        cross_cutting_themes,
    })
}

fn parse_opportunity(
    value: &Value,
    patterns: &[Pattern],
    index: &SourceIndex<'_>,
    registry: &CategoryRegistry,
) -> Option<Opportunity> {
    let name = str_field(value, "name");
    if name.is_empty() {
        warn!("skipping opportunity without a name");
        return None;
    }

    let opportunity = Opportunity {
        name,
        description: str_field(value, "description"),
        weighted_score: f64_field(value, "weighted_score"),
        source_count: u32_field(value, "source_count"),
        problems: array_field(value, "problems")
            .iter()
            .filter_map(parse_problem)
            .collect(),
        jobs_to_be_done: str_list(value, "jobs_to_be_done"),
        solutions: array_field(value, "solutions")
            .iter()
            .filter_map(parse_solution)
            .collect(),
        next_steps: str_list(value, "next_steps"),
        contributing_patterns: str_list(value, "contributing_patterns"),
        ..Default::default()
    };
    let reported = ReportedFigures {
        evidence_strength: str_field(value, "evidence_strength"),
        source_breakdown: count_map(value, "source_breakdown"),
    };
    Some(repair_opportunity(
        opportunity,
        reported,
        patterns,
        index,
        registry,
    ))
}

fn parse_problem(value: &Value) -> Option<OpportunityProblem> {
    let description = str_field(value, "description");
    if description.is_empty() {
        return None;
    }
    let source_id = str_field(value, "source_id");
    Some(OpportunityProblem {
        description,
        source_id: (!source_id.is_empty()).then_some(source_id),
        severity: Severity::from_label(&str_field(value, "severity")),
    })
}

fn parse_solution(value: &Value) -> Option<SolutionOption> {
    let name = str_field(value, "name");
    if name.is_empty() {
        return None;
    }
    Some(SolutionOption {
        name,
        description: str_field(value, "description"),
        expected_impact: str_field(value, "expected_impact"),
        effort: str_field(value, "effort").to_ascii_uppercase(),
        evidence_sources: str_list(value, "evidence_sources"),
    })
}

fn parse_theme(value: &Value, registry: &CategoryRegistry) -> Option<CrossCuttingTheme> {
    let name = str_field(value, "name");
    if name.is_empty() {
        return None;
    }
    let theme = CrossCuttingTheme {
        name,
        description: str_field(value, "description"),
        source_percentage: f64_field(value, "source_percentage"),
        category_breakdown: Default::default(),
    };
    Some(repair_theme(
        theme,
        count_map(value, "category_breakdown"),
        registry,
    ))
}
