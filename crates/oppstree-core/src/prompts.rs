//! Prompt templates for each level of the synthesis pyramid.
//!
//! System instructions are fixed. User prompts wrap a serialized context
//! block with the task and an explicit JSON output schema; category keys
//! in the schemas come from the configured registry.

use std::collections::BTreeMap;

use oppstree_types::CategoryRegistry;

// ── Level 2: extraction ──────────────────────────────────────────────────

pub const EXTRACTION_SYSTEM: &str = "\
You are a senior product strategist analyzing raw product signals.
You extract structured insights from source documents using the Opportunity
Solution Tree framework and Jobs-to-be-Done.

Every extraction must reference the source it came from. You distinguish
problems (what is broken) from jobs-to-be-done (what users are trying to
accomplish) and from solution requests (specific asks, noted but not
prioritized).";

pub fn extraction_user(sources_xml: &str) -> String {
    format!(
        r#"<task>
Analyze each source document below. For EACH source, extract:

1. Problems: what is broken, painful, or inefficient? Include severity (high/medium/low) and a direct quote as evidence.
2. Jobs-to-be-Done: what is the user trying to accomplish? Format: "When [situation], I want to [motivation], so I can [outcome]".
3. Pain points: friction points with severity (high/medium/low).
4. Desired outcomes: what success looks like from this source's perspective.
5. Solution requests: specific feature or product asks. Note them but do NOT prioritize them over problems or jobs.

Preserve each source id exactly as given.
If a source has no relevant content for a category, omit that category. Do not fabricate.
If a source has no relevant content at all, omit the source.
</task>

{sources_xml}

<output_format>
Respond ONLY with valid JSON. No markdown code fences, no other text before or after.

[
  {{
    "source_id": "exact source id from input",
    "category": "category from input",
    "problems": [
      {{ "description": "Clear description of the problem", "severity": "high|medium|low", "evidence": "Direct quote from the source" }}
    ],
    "jobs_to_be_done": ["When [situation], I want to [motivation], so I can [outcome]"],
    "pain_points": [
      {{ "description": "Description of friction", "severity": "high|medium|low" }}
    ],
    "desired_outcomes": ["What success looks like"],
    "solution_requests": ["Specific ask mentioned"]
  }}
]
</output_format>"#
    )
}

// ── Level 3: patterns ────────────────────────────────────────────────────

pub const PATTERN_SYSTEM: &str = "\
You are a senior product strategist performing cross-source pattern
analysis. You identify recurring themes across diverse product signals, with
special attention to patterns that span several organizational levels
(customers, internal teams, support).

The most valuable insight is a problem that appears in multiple source
categories: it signals a systemic issue, not an isolated complaint. You
weight sources by their importance to strategic decisions.";

/// `category_counts` maps category key → number of sources in the run.
pub fn pattern_user(
    source_count: usize,
    category_counts: &BTreeMap<String, usize>,
    registry: &CategoryRegistry,
    insights_xml: &str,
) -> String {
    let weights: Vec<String> = registry
        .iter()
        .map(|c| {
            format!(
                "- {} (weight: {}x): {} sources",
                c.label,
                c.weight,
                category_counts.get(&c.key).copied().unwrap_or(0)
            )
        })
        .collect();
    let weights = weights.join("\n");
    let breakdown = breakdown_example(registry);

    format!(
        r#"<task>
You have categorized insights from {source_count} sources across these
categories (with importance weights):

{weights}

Identify PATTERNS: problems, needs, or themes that appear across MULTIPLE
sources. The strongest signal is a pattern spanning several categories.

For each pattern:
1. Give it a clear, descriptive name
2. Count how many sources mention it (frequency)
3. Compute weighted_score as the sum of the weights of the sources mentioning it
4. Assess severity (high/medium/low)
5. Describe business impact (revenue, churn, efficiency)
6. Flag whether it is a cross-org signal (appears in 2+ categories)
7. List all evidence with source ids and quotes

List ALL patterns, even those found in only 2-3 sources.
</task>

{insights_xml}

<output_format>
Respond ONLY with valid JSON. No markdown code fences, no other text before or after.

[
  {{
    "name": "Short descriptive name",
    "description": "What this pattern represents",
    "frequency": 5,
    "weighted_score": 12.5,
    "severity": "high|medium|low",
    "business_impact": "Revenue/churn/efficiency impact",
    "cross_org_signal": true,
    "evidence": [
      {{ "source_id": "...", "category": "...", "weight": 3.0, "quote": "Quote or summary from this source" }}
    ],
    "source_breakdown": {breakdown}
  }}
]
</output_format>"#
    )
}

// ── Level 4: opportunity mapping ─────────────────────────────────────────

pub const MAPPING_SYSTEM: &str = "\
You are a senior product strategist building an Opportunity Solution Tree.
You map validated patterns into strategic opportunity spaces with
actionable solution options.

Your output drives a structured report and interactive visualizations, so
you return well-formed JSON with numeric scores and complete source
breakdowns.

Opportunities are problem and need spaces, not solutions. Solutions are
options to explore within each opportunity space.";

pub fn mapping_user(
    source_count: usize,
    desired_outcomes: &[String],
    registry: &CategoryRegistry,
    patterns_xml: &str,
) -> String {
    let outcomes_section = if desired_outcomes.is_empty() {
        "Infer 2-4 desired outcomes from the strongest patterns. State them as \
         measurable strategic goals the evidence supports (e.g. \"Reduce customer \
         onboarding time by 50%\")."
            .to_string()
    } else {
        let listed: Vec<String> = desired_outcomes.iter().map(|o| format!("- {o}")).collect();
        format!(
            "Map opportunities to these user-specified desired outcomes, using each \
             statement verbatim:\n{}\n\nAdd other outcomes only if the data strongly \
             supports them.",
            listed.join("\n")
        )
    };
    let breakdown = breakdown_example(registry);

    format!(
        r#"<task>
Using the patterns identified across {source_count} sources, create an
Opportunity Solution Tree.

Desired outcomes:
{outcomes_section}

For EACH desired outcome:
1. Group related patterns into OPPORTUNITY SPACES (problem/need clusters)
2. For each opportunity, propose 2-3 SOLUTION OPTIONS
3. Rank opportunities by weighted_score (more evidence = higher priority)
4. Include a source_breakdown counting contributing sources per category
5. Name the contributing patterns exactly as given

Only cite source ids that appear in the patterns' evidence.
</task>

{patterns_xml}

<output_format>
Respond ONLY with valid JSON. No markdown code fences, no other text.

{{
  "desired_outcomes": [
    {{
      "statement": "Measurable outcome statement",
      "opportunities": [
        {{
          "name": "Opportunity space name",
          "description": "What problem/need space this represents",
          "evidence_strength": "HIGH|MEDIUM|LOW",
          "weighted_score": 12.5,
          "source_count": 8,
          "source_breakdown": {breakdown},
          "problems": [
            {{ "description": "...", "source_id": "...", "severity": "high|medium|low" }}
          ],
          "jobs_to_be_done": ["When..., I want..., so I can..."],
          "solutions": [
            {{
              "name": "Solution name",
              "description": "What this solution does",
              "expected_impact": "Quantified if possible",
              "effort": "HIGH|MEDIUM|LOW",
              "evidence_sources": ["source_id_1", "source_id_2"]
            }}
          ],
          "next_steps": ["Interview X customers about...", "Prototype Y..."],
          "contributing_patterns": ["pattern name 1", "pattern name 2"]
        }}
      ]
    }}
  ],
  "cross_cutting_themes": [
    {{
      "name": "Theme name",
      "description": "What this theme represents",
      "source_percentage": 45,
      "category_breakdown": {breakdown}
    }}
  ]
}}
</output_format>"#
    )
}

/// `{ "customer_calls": 0, ... }` over the registry keys.
fn breakdown_example(registry: &CategoryRegistry) -> String {
    let entries: Vec<String> = registry.keys().map(|k| format!("\"{k}\": 0")).collect();
    format!("{{ {} }}", entries.join(", "))
}
