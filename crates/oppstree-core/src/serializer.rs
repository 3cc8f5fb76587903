//! Context serializer: renders sources, insights and patterns into compact
//! XML-style prompt blocks.
//!
//! Every block opens with a header carrying the record count and a
//! per-category breakdown in registry order. All text is escaped so no
//! content can be read as markup, and any content field longer than the
//! character budget is cut and marked with `[truncated]`. Output is a pure
//! function of the input.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use oppstree_types::source::{CONTENT_TRUNCATED_MARKER, truncate_chars};
use oppstree_types::{CategoryRegistry, ExtractedInsight, Pattern, Source};

/// Appended to a content field cut at the character budget.
pub const TRUNCATED_MARKER: &str = "[truncated]";

/// Escape `& < > " '` for use in element text and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape `text`, cutting it at `max_chars` characters first.
fn escape_bounded(text: &str, max_chars: usize) -> String {
    match truncate_chars(text, max_chars) {
        Some(head) => format!("{}\n{TRUNCATED_MARKER}", escape(head)),
        None => escape(text),
    }
}

/// Source content with at most one truncation marker. A source already
/// cut when it was built loses its own marker and is re-marked here.
fn escape_source_content(content: &str, max_chars: usize) -> String {
    let (body, already_cut) = match content.strip_suffix(CONTENT_TRUNCATED_MARKER) {
        Some(body) => (body, true),
        None => (content, false),
    };
    match truncate_chars(body, max_chars) {
        Some(head) => format!("{}\n{TRUNCATED_MARKER}", escape(head)),
        None if already_cut => format!("{}\n{TRUNCATED_MARKER}", escape(body)),
        None => escape(body),
    }
}

/// `Label: n, Label: n` for categories with a non-zero count.
fn breakdown_attr<'a>(
    registry: &CategoryRegistry,
    categories: impl Iterator<Item = &'a str>,
) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for cat in categories {
        *counts.entry(cat).or_insert(0) += 1;
    }

    let mut parts: Vec<String> = registry
        .keys()
        .filter_map(|key| counts.remove(key).map(|n| format!("{}: {n}", registry.label(key))))
        .collect();
    // Categories outside the registry, in key order.
    parts.extend(counts.into_iter().map(|(key, n)| format!("{key}: {n}")));
    escape(&parts.join(", "))
}

/// Render sources for the extraction prompt.
pub fn sources_context(
    sources: &[Source],
    registry: &CategoryRegistry,
    max_chars: usize,
) -> String {
    let mut out = String::new();
    let breakdown = breakdown_attr(registry, sources.iter().map(|s| s.category.as_str()));
    let _ = writeln!(
        out,
        r#"<sources total="{}" breakdown="{breakdown}">"#,
        sources.len()
    );

    for s in sources {
        let _ = writeln!(
            out,
            r#"  <source id="{}" category="{}" weight="{:?}" filename="{}">"#,
            escape(&s.id),
            escape(&s.category),
            s.weight,
            escape(&s.filename),
        );
        let _ = writeln!(
            out,
            "    <content>{}</content>",
            escape_source_content(&s.content, max_chars)
        );
        out.push_str("  </source>\n");
    }

    out.push_str("</sources>");
    out
}

/// Render extracted insights for the pattern prompt.
pub fn insights_context(
    insights: &[ExtractedInsight],
    registry: &CategoryRegistry,
    max_chars: usize,
) -> String {
    let mut out = String::new();
    let breakdown = breakdown_attr(registry, insights.iter().map(|i| i.category.as_str()));
    let _ = writeln!(
        out,
        r#"<categorized_insights total="{}" breakdown="{breakdown}">"#,
        insights.len()
    );

    for insight in insights {
        let _ = writeln!(
            out,
            r#"  <source_insight source_id="{}" category="{}">"#,
            escape(&insight.source_id),
            escape(&insight.category),
        );

        if !insight.problems.is_empty() {
            out.push_str("    <problems>\n");
            for p in &insight.problems {
                let _ = writeln!(out, r#"      <problem severity="{}">"#, p.severity);
                let _ = writeln!(
                    out,
                    "        <description>{}</description>",
                    escape_bounded(&p.description, max_chars)
                );
                if !p.evidence.is_empty() {
                    let _ = writeln!(
                        out,
                        "        <evidence>{}</evidence>",
                        escape_bounded(&p.evidence, max_chars)
                    );
                }
                out.push_str("      </problem>\n");
            }
            out.push_str("    </problems>\n");
        }

        if !insight.jobs_to_be_done.is_empty() {
            out.push_str("    <jobs_to_be_done>\n");
            for j in &insight.jobs_to_be_done {
                let _ = writeln!(
                    out,
                    "      <jtbd>{}</jtbd>",
                    escape_bounded(j, max_chars)
                );
            }
            out.push_str("    </jobs_to_be_done>\n");
        }

        if !insight.pain_points.is_empty() {
            out.push_str("    <pain_points>\n");
            for pp in &insight.pain_points {
                let _ = writeln!(
                    out,
                    r#"      <pain severity="{}">{}</pain>"#,
                    pp.severity,
                    escape_bounded(&pp.description, max_chars)
                );
            }
            out.push_str("    </pain_points>\n");
        }

        if !insight.desired_outcomes.is_empty() {
            out.push_str("    <desired_outcomes>\n");
            for o in &insight.desired_outcomes {
                let _ = writeln!(
                    out,
                    "      <outcome>{}</outcome>",
                    escape_bounded(o, max_chars)
                );
            }
            out.push_str("    </desired_outcomes>\n");
        }

        if !insight.solution_requests.is_empty() {
            out.push_str("    <solution_requests>\n");
            for r in &insight.solution_requests {
                let _ = writeln!(
                    out,
                    "      <request>{}</request>",
                    escape_bounded(r, max_chars)
                );
            }
            out.push_str("    </solution_requests>\n");
        }

        out.push_str("  </source_insight>\n");
    }

    out.push_str("</categorized_insights>");
    out
}

/// Render patterns for the mapping prompt.
pub fn patterns_context(
    patterns: &[Pattern],
    registry: &CategoryRegistry,
    max_chars: usize,
) -> String {
    let mut out = String::new();
    let breakdown = breakdown_attr(
        registry,
        patterns.iter().flat_map(|p| p.evidence.iter().map(|e| e.category.as_str())),
    );
    let _ = writeln!(
        out,
        r#"<patterns total="{}" evidence_breakdown="{breakdown}">"#,
        patterns.len()
    );

    for p in patterns {
        out.push_str("  <pattern>\n");
        let _ = writeln!(out, "    <name>{}</name>", escape(&p.name));
        let _ = writeln!(
            out,
            "    <description>{}</description>",
            escape_bounded(&p.description, max_chars)
        );
        let _ = writeln!(out, "    <frequency>{}</frequency>", p.frequency);
        let _ = writeln!(out, "    <weighted_score>{:.1}</weighted_score>", p.weighted_score);
        let _ = writeln!(out, "    <severity>{}</severity>", p.severity);
        let _ = writeln!(
            out,
            "    <business_impact>{}</business_impact>",
            escape_bounded(&p.business_impact, max_chars)
        );
        let _ = writeln!(out, "    <cross_org_signal>{}</cross_org_signal>", p.cross_org_signal);

        if !p.evidence.is_empty() {
            out.push_str("    <evidence>\n");
            for e in &p.evidence {
                let _ = writeln!(
                    out,
                    r#"      <source source_id="{}" category="{}" weight="{:?}">{}</source>"#,
                    escape(&e.source_id),
                    escape(&e.category),
                    e.weight,
                    escape_bounded(&e.quote, max_chars),
                );
            }
            out.push_str("    </evidence>\n");
        }

        if !p.source_breakdown.is_empty() {
            out.push_str("    <source_breakdown>\n");
            for key in registry.keys() {
                if let Some(count) = p.source_breakdown.get(key) {
                    let _ = writeln!(
                        out,
                        r#"      <category name="{}" count="{count}" />"#,
                        escape(key)
                    );
                }
            }
            out.push_str("    </source_breakdown>\n");
        }

        out.push_str("  </pattern>\n");
    }

    out.push_str("</patterns>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use oppstree_types::{PatternEvidence, Problem, Severity};

    fn sources() -> Vec<Source> {
        let reg = CategoryRegistry::builtin();
        vec![
            Source::new(&reg, "customer_calls", 0, "call.txt", "Onboarding <took> weeks & more", 10_000)
                .unwrap(),
            Source::new(&reg, "support_tickets", 0, "t\"1\".txt", "Setup wizard crashed", 10_000)
                .unwrap(),
            Source::new(&reg, "customer_calls", 1, "call2.txt", "Pricing is fine", 10_000).unwrap(),
        ]
    }

    #[test]
    fn escape_all_markup_characters() {
        assert_eq!(escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &apos;Jerry&apos;&lt;/a&gt;");
    }

    #[test]
    fn sources_header_counts_in_registry_order() {
        let reg = CategoryRegistry::builtin();
        let xml = sources_context(&sources(), &reg, 1000);
        let first = xml.lines().next().unwrap();
        assert_eq!(
            first,
            r#"<sources total="3" breakdown="Customer-Facing Calls: 2, Support Tickets: 1">"#
        );
    }

    #[test]
    fn sources_are_escaped_and_attributed() {
        let reg = CategoryRegistry::builtin();
        let xml = sources_context(&sources(), &reg, 1000);
        assert!(xml.contains(
            r#"<source id="customer_calls_000" category="customer_calls" weight="3.0" filename="call.txt">"#
        ));
        assert!(xml.contains("Onboarding &lt;took&gt; weeks &amp; more"));
        assert!(xml.contains(r#"filename="t&quot;1&quot;.txt""#));
        assert!(xml.contains(r#"weight="1.5""#));
        assert!(!xml.contains("<took>"));
        assert!(xml.ends_with("</sources>"));
    }

    #[test]
    fn content_over_budget_is_marked() {
        let reg = CategoryRegistry::builtin();
        let xml = sources_context(&sources(), &reg, 10);
        assert!(xml.contains("<content>Onboarding\n[truncated]</content>"));
        assert!(xml.contains("<content>Pricing is\n[truncated]</content>"));
    }

    #[test]
    fn source_cut_at_build_gets_one_marker() {
        let reg = CategoryRegistry::builtin();
        let long = "x".repeat(200);
        let s = vec![Source::new(&reg, "customer_calls", 0, "a.txt", long, 100).unwrap()];
        assert!(s[0].content.ends_with(CONTENT_TRUNCATED_MARKER));

        for budget in [50, 100, 120, 1000] {
            let xml = sources_context(&s, &reg, budget);
            assert_eq!(xml.matches(TRUNCATED_MARKER).count(), 1, "budget {budget}");
            assert!(!xml.contains("content truncated"), "budget {budget}");
        }
        let xml = sources_context(&s, &reg, 1000);
        assert!(xml.contains(&format!("<content>{}\n[truncated]</content>", "x".repeat(100))));
    }

    #[test]
    fn free_text_fields_respect_budget() {
        let reg = CategoryRegistry::builtin();
        let long = "y".repeat(500);
        let insights = vec![ExtractedInsight {
            source_id: "customer_calls_000".into(),
            category: "customer_calls".into(),
            problems: vec![Problem {
                description: long.clone(),
                severity: Severity::High,
                evidence: String::new(),
            }],
            jobs_to_be_done: vec![long.clone()],
            desired_outcomes: vec![long.clone()],
            solution_requests: vec![long.clone()],
            ..Default::default()
        }];
        let xml = insights_context(&insights, &reg, 50);
        assert!(!xml.contains(&long));
        assert_eq!(xml.matches(TRUNCATED_MARKER).count(), 4);
        assert!(xml.contains(&format!("<jtbd>{}\n[truncated]</jtbd>", "y".repeat(50))));

        let patterns = vec![Pattern {
            name: "Slow onboarding".into(),
            description: long.clone(),
            business_impact: long.clone(),
            ..Default::default()
        }];
        let xml = patterns_context(&patterns, &reg, 50);
        assert!(!xml.contains(&long));
        assert_eq!(xml.matches(TRUNCATED_MARKER).count(), 2);
    }

    #[test]
    fn serialization_is_idempotent() {
        let reg = CategoryRegistry::builtin();
        let s = sources();
        assert_eq!(sources_context(&s, &reg, 50), sources_context(&s, &reg, 50));
    }

    #[test]
    fn insights_omit_empty_sections() {
        let reg = CategoryRegistry::builtin();
        let insights = vec![ExtractedInsight {
            source_id: "customer_calls_000".into(),
            category: "customer_calls".into(),
            problems: vec![Problem {
                description: "Onboarding is slow".into(),
                severity: Severity::High,
                evidence: "took <3> weeks".into(),
            }],
            ..Default::default()
        }];
        let xml = insights_context(&insights, &reg, 1000);
        assert!(xml.starts_with(
            r#"<categorized_insights total="1" breakdown="Customer-Facing Calls: 1">"#
        ));
        assert!(xml.contains(r#"<problem severity="high">"#));
        assert!(xml.contains("<evidence>took &lt;3&gt; weeks</evidence>"));
        assert!(!xml.contains("<jobs_to_be_done>"));
        assert!(!xml.contains("<pain_points>"));
    }

    #[test]
    fn patterns_render_scores_and_breakdown() {
        let reg = CategoryRegistry::builtin();
        let mut breakdown = reg.empty_breakdown();
        breakdown.insert("customer_calls".into(), 1);
        breakdown.insert("support_tickets".into(), 1);
        let patterns = vec![Pattern {
            name: "Slow onboarding".into(),
            frequency: 2,
            weighted_score: 4.5,
            cross_org_signal: true,
            evidence: vec![
                PatternEvidence {
                    source_id: "customer_calls_000".into(),
                    category: "customer_calls".into(),
                    weight: 3.0,
                    quote: "weeks".into(),
                },
                PatternEvidence {
                    source_id: "support_tickets_000".into(),
                    category: "support_tickets".into(),
                    weight: 1.5,
                    quote: "crashed".into(),
                },
            ],
            source_breakdown: breakdown,
            ..Default::default()
        }];
        let xml = patterns_context(&patterns, &reg, 1000);
        assert!(xml.starts_with(
            r#"<patterns total="1" evidence_breakdown="Customer-Facing Calls: 1, Support Tickets: 1">"#
        ));
        assert!(xml.contains("<weighted_score>4.5</weighted_score>"));
        assert!(xml.contains("<cross_org_signal>true</cross_org_signal>"));
        assert!(xml.contains("<severity>medium</severity>"));
        assert!(xml.contains(
            r#"<source source_id="support_tickets_000" category="support_tickets" weight="1.5">crashed</source>"#
        ));
        let cc = xml.find(r#"<category name="customer_calls""#).unwrap();
        let misc = xml.find(r#"<category name="miscellaneous" count="0" />"#).unwrap();
        assert!(cc < misc);
    }
}
