//! Pipeline integration tests.
//!
//! Drives the full extraction → patterns → mapping → assembly pipeline
//! against a scripted in-memory generator.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use oppstree_core::prompts::{EXTRACTION_SYSTEM, MAPPING_SYSTEM, PATTERN_SYSTEM};
use oppstree_core::stages::extraction::extract_insights;
use oppstree_core::stages::patterns::parse_patterns;
use oppstree_core::{
    Generation, GeneratorError, ProgressFn, Stage, SynthesisError, Synthesizer, TextGenerator,
};
use oppstree_types::{
    CategoryRegistry, EvidenceStrength, OutcomeOrigin, PipelineConfig, Source,
};

// ── Scripted generator ───────────────────────────────────────────────────

struct Reply {
    result: Result<Generation, GeneratorError>,
    delay: Duration,
}

impl Reply {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            result: Ok(Generation::complete(text)),
            delay: Duration::ZERO,
        }
    }

    fn truncated(text: impl Into<String>) -> Self {
        Self {
            result: Ok(Generation::truncated(text)),
            delay: Duration::ZERO,
        }
    }

    fn fail(msg: &str) -> Self {
        Self {
            result: Err(GeneratorError::Other(msg.into())),
            delay: Duration::ZERO,
        }
    }

    fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Handler = dyn Fn(Stage, &str) -> Reply + Send + Sync;

struct Scripted {
    handler: Box<Handler>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(Stage, String)>>,
}

impl Scripted {
    fn new(handler: impl Fn(Stage, &str) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompt_for(&self, stage: Stage) -> Option<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, p)| p.clone())
    }
}

fn stage_of(system: &str) -> Stage {
    match system {
        EXTRACTION_SYSTEM => Stage::Extraction,
        PATTERN_SYSTEM => Stage::Patterns,
        MAPPING_SYSTEM => Stage::Mapping,
        other => panic!("unexpected system prompt: {other}"),
    }
}

#[async_trait]
impl TextGenerator for Scripted {
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stage = stage_of(system);
        self.prompts.lock().unwrap().push((stage, user.to_string()));
        let reply = (self.handler)(stage, user);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}

/// Source ids serialized into an extraction prompt, in prompt order.
fn source_ids(prompt: &str) -> Vec<String> {
    prompt
        .split("<source id=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .map(String::from)
        .collect()
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn onboarding_sources() -> Vec<Source> {
    let reg = CategoryRegistry::builtin();
    vec![
        Source::new(
            &reg,
            "customer_calls",
            0,
            "acme-discovery.txt",
            "Honestly onboarding took us six weeks. Slow onboarding is our biggest pain.",
            16_000,
        )
        .unwrap(),
        Source::new(
            &reg,
            "internal_meetings",
            0,
            "q3-planning.md",
            "We agreed to move the offsite to October.",
            16_000,
        )
        .unwrap(),
        Source::new(
            &reg,
            "support_tickets",
            0,
            "tickets.csv",
            "#4411 Customer stuck on setup step 3 for days; onboarding is slow.",
            16_000,
        )
        .unwrap(),
    ]
}

fn insight_for(id: &str) -> String {
    if id.starts_with("internal_meetings") {
        // Unrelated content: no problems reported.
        format!(r#"{{"source_id": "{id}", "jobs_to_be_done": ["When planning, I want a date, so I can book travel"]}}"#)
    } else {
        format!(
            r#"{{"source_id": "{id}", "problems": [{{"description": "Slow onboarding", "severity": "high", "evidence": "onboarding is slow"}}]}}"#
        )
    }
}

fn extraction_reply(prompt: &str) -> String {
    let items: Vec<String> = source_ids(prompt).iter().map(|id| insight_for(id)).collect();
    format!("[{}]", items.join(","))
}

const PATTERN_REPLY: &str = r#"[
  {
    "name": "Slow onboarding",
    "description": "New customers take weeks to get set up",
    "frequency": 5,
    "weighted_score": 0,
    "severity": "high",
    "business_impact": "Churn in the first 90 days",
    "cross_org_signal": false,
    "evidence": [
      {"source_id": "customer_calls_000", "category": "customer_calls", "weight": 3.0, "quote": "took us six weeks"},
      {"source_id": "support_tickets_000", "category": "support_tickets", "weight": 1.5, "quote": "stuck on setup"}
    ]
  }
]"#;

const MAPPING_REPLY: &str = r#"{
  "desired_outcomes": [
    {
      "statement": "Reduce time to first value",
      "opportunities": [
        {
          "name": "Faster onboarding",
          "description": "Shorten setup for new accounts",
          "evidence_strength": "",
          "weighted_score": 1,
          "source_count": 9,
          "problems": [
            {"description": "Setup takes weeks", "source_id": "customer_calls_000", "severity": "high"},
            {"description": "Invented problem", "source_id": "customer_calls_042", "severity": "low"}
          ],
          "jobs_to_be_done": ["When I sign up, I want to import my data, so I can show value to my team"],
          "solutions": [
            {"name": "Guided setup", "description": "Step-by-step wizard", "expected_impact": "-50% setup time",
             "effort": "medium", "evidence_sources": ["support_tickets_000", "internal_meetings_777"]}
          ],
          "next_steps": ["Interview 5 recently onboarded customers"],
          "contributing_patterns": ["Slow onboarding"]
        }
      ]
    }
  ],
  "cross_cutting_themes": [
    {"name": "Time to value", "description": "Speed of setup", "source_percentage": 66.7,
     "category_breakdown": {"customer_calls": 1, "support_tickets": 1}}
  ]
}"#;

fn happy_path() -> Arc<Scripted> {
    Scripted::new(|stage, prompt| match stage {
        Stage::Extraction => Reply::ok(extraction_reply(prompt)),
        Stage::Patterns => Reply::ok(PATTERN_REPLY),
        Stage::Mapping => Reply::ok(MAPPING_REPLY),
        Stage::Assembly => unreachable!(),
    })
}

fn synthesizer(generator: Arc<Scripted>, pipeline: PipelineConfig) -> Synthesizer {
    Synthesizer::new(generator, pipeline, CategoryRegistry::builtin())
}

fn outcomes(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ── End to end ───────────────────────────────────────────────────────────

#[tokio::test]
async fn onboarding_scenario_end_to_end() {
    let generator = happy_path();
    let synth = synthesizer(generator.clone(), PipelineConfig::default());
    let sources = onboarding_sources();

    let result = synth
        .run(&sources, &outcomes(&["Reduce time to first value"]), None)
        .await
        .unwrap();

    assert_eq!(generator.calls(), 3);

    // The pattern handed to mapping carries recomputed figures.
    let mapping_prompt = generator.prompt_for(Stage::Mapping).unwrap();
    assert!(mapping_prompt.contains("<frequency>2</frequency>"));
    assert!(mapping_prompt.contains("<weighted_score>4.5</weighted_score>"));
    assert!(mapping_prompt.contains("<cross_org_signal>true</cross_org_signal>"));

    assert_eq!(result.desired_outcomes.len(), 1);
    let outcome = &result.desired_outcomes[0];
    assert_eq!(outcome.origin, OutcomeOrigin::UserSpecified);
    assert_eq!(outcome.opportunities.len(), 1);

    let opp = &outcome.opportunities[0];
    assert_eq!(opp.source_count, 2);
    assert!((opp.weighted_score - 4.5).abs() < 1e-6);
    assert_eq!(opp.evidence_strength, EvidenceStrength::Low);
    assert_eq!(opp.contributing_patterns, vec!["Slow onboarding"]);
    let expected: BTreeMap<String, u32> = [
        ("customer_calls", 1),
        ("internal_meetings", 0),
        ("support_tickets", 1),
        ("other_sources", 0),
        ("miscellaneous", 0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    assert_eq!(opp.source_breakdown, expected);

    assert_eq!(result.cross_cutting_themes.len(), 1);
    assert_eq!(result.cross_cutting_themes[0].category_breakdown.len(), 5);

    assert_eq!(result.evidence_index.len(), 3);
    assert_eq!(result.sources_summary.total, 3);
    assert_eq!(result.sources_summary.by_category["internal_meetings"].count, 1);
    assert_eq!(result.sources_summary.by_category["other_sources"].count, 0);
    assert!(!result.run_id.is_empty());
}

#[test]
fn onboarding_pattern_is_repaired() {
    let reg = CategoryRegistry::builtin();
    let patterns = parse_patterns(PATTERN_REPLY, &onboarding_sources(), &reg).unwrap();
    assert_eq!(patterns.len(), 1);
    let p = &patterns[0];
    assert_eq!(p.frequency, 2);
    assert!((p.weighted_score - 4.5).abs() < 1e-6);
    assert!(p.cross_org_signal);
}

#[tokio::test]
async fn every_cited_source_exists() {
    let sources = onboarding_sources();
    let result = synthesizer(happy_path(), PipelineConfig::default())
        .run(&sources, &[], None)
        .await
        .unwrap();

    let known: BTreeSet<&str> = sources.iter().map(|s| s.id.as_str()).collect();
    for opp in result.opportunities() {
        for problem in &opp.problems {
            if let Some(id) = &problem.source_id {
                assert!(known.contains(id.as_str()), "unknown problem source {id}");
            }
        }
        for solution in &opp.solutions {
            for id in &solution.evidence_sources {
                assert!(known.contains(id.as_str()), "unknown solution source {id}");
            }
        }
    }
    assert_eq!(result.total_problems(), 2);
    assert_eq!(
        result.opportunities()[0].solutions[0].evidence_sources,
        vec!["support_tickets_000"]
    );
}

#[tokio::test]
async fn inferred_outcome_without_user_statements() {
    let result = synthesizer(happy_path(), PipelineConfig::default())
        .run(&onboarding_sources(), &[], None)
        .await
        .unwrap();
    assert_eq!(result.desired_outcomes[0].origin, OutcomeOrigin::Inferred);
}

#[tokio::test]
async fn omitted_user_outcome_survives() {
    let sources = onboarding_sources();
    let result = synthesizer(happy_path(), PipelineConfig::default())
        .run(
            &sources,
            &outcomes(&["Reduce time to first value", "Cut support volume"]),
            None,
        )
        .await
        .unwrap();
    let statements: Vec<&str> = result
        .desired_outcomes
        .iter()
        .map(|o| o.statement.as_str())
        .collect();
    assert_eq!(statements, vec!["Reduce time to first value", "Cut support volume"]);
    assert!(result.desired_outcomes[1].opportunities.is_empty());
}

// ── Extraction ───────────────────────────────────────────────────────────

fn many_sources(n: usize) -> Vec<Source> {
    let reg = CategoryRegistry::builtin();
    let cats = ["customer_calls", "internal_meetings", "support_tickets", "other_sources"];
    (0..n)
        .map(|i| {
            Source::new(
                &reg,
                cats[i % cats.len()],
                i,
                format!("doc-{i}.txt"),
                format!("document {i} mentions slow onboarding"),
                16_000,
            )
            .unwrap()
        })
        .collect()
}

fn pipeline_with(batch_size: usize, parallelism: usize) -> PipelineConfig {
    PipelineConfig {
        batch_size,
        parallelism,
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn batching_does_not_change_insight_ids() {
    let sources = many_sources(25);
    let reg = CategoryRegistry::builtin();
    let no_progress = |_: usize, _: usize| {};

    let batched = happy_path();
    let a = extract_insights(
        batched.as_ref(),
        &sources,
        &reg,
        &pipeline_with(10, 1),
        None,
        &no_progress,
    )
    .await
    .unwrap();
    assert_eq!(batched.calls(), 3);

    let single = happy_path();
    let b = extract_insights(
        single.as_ref(),
        &sources,
        &reg,
        &pipeline_with(25, 1),
        None,
        &no_progress,
    )
    .await
    .unwrap();
    assert_eq!(single.calls(), 1);

    let ids_a: Vec<&str> = a.iter().map(|i| i.source_id.as_str()).collect();
    let ids_b: Vec<&str> = b.iter().map(|i| i.source_id.as_str()).collect();
    assert_eq!(ids_a.len(), 25);
    assert_eq!(ids_a, ids_b);
}

#[tokio::test]
async fn parallel_batches_merge_in_source_order() {
    let sources = many_sources(25);
    let reg = CategoryRegistry::builtin();
    // Earlier batches answer slower so they finish last.
    let generator = Scripted::new(|_, prompt| {
        let ids = source_ids(prompt);
        let delay = if ids.iter().any(|id| id.ends_with("_000")) { 80 } else { 5 };
        Reply::ok(extraction_reply(prompt)).after(Duration::from_millis(delay))
    });
    let done = Mutex::new(Vec::new());
    let on_batch = |finished: usize, total: usize| done.lock().unwrap().push((finished, total));

    let insights = extract_insights(
        generator.as_ref(),
        &sources,
        &reg,
        &pipeline_with(10, 3),
        None,
        &on_batch,
    )
    .await
    .unwrap();

    let ids: Vec<&str> = insights.iter().map(|i| i.source_id.as_str()).collect();
    let expected: Vec<&str> = sources.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, expected);
    assert_eq!(*done.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
}

#[tokio::test]
async fn sources_without_problems_get_none() {
    let sources = onboarding_sources();
    let reg = CategoryRegistry::builtin();
    let insights = extract_insights(
        happy_path().as_ref(),
        &sources,
        &reg,
        &PipelineConfig::default(),
        None,
        &|_: usize, _: usize| {},
    )
    .await
    .unwrap();
    let meeting = insights
        .iter()
        .find(|i| i.category == "internal_meetings")
        .unwrap();
    assert!(meeting.problems.is_empty());
}

// ── Failure paths ────────────────────────────────────────────────────────

#[tokio::test]
async fn truncated_extraction_aborts_run() {
    let generator = Scripted::new(|stage, _| match stage {
        Stage::Extraction => Reply::truncated(r#"[{"source_id": "customer_calls_000", "problems": ["#),
        _ => Reply::ok("[]"),
    });
    let err = synthesizer(generator.clone(), PipelineConfig::default())
        .run(&onboarding_sources(), &[], None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SynthesisError::OutputTruncated {
            stage: Stage::Extraction
        }
    ));
    assert!(err.to_string().contains("reduce the batch size"));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn fenced_replies_are_accepted() {
    let generator = Scripted::new(|stage, prompt| {
        let body = match stage {
            Stage::Extraction => extraction_reply(prompt),
            Stage::Patterns => PATTERN_REPLY.to_string(),
            _ => MAPPING_REPLY.to_string(),
        };
        Reply::ok(format!("```json\n{body}\n```"))
    });
    let result = synthesizer(generator, PipelineConfig::default())
        .run(&onboarding_sources(), &[], None)
        .await
        .unwrap();
    assert_eq!(result.total_opportunities(), 1);
}

#[tokio::test]
async fn prose_reply_is_malformed_for_its_stage() {
    let generator = Scripted::new(|stage, prompt| match stage {
        Stage::Extraction => Reply::ok(extraction_reply(prompt)),
        Stage::Patterns => Reply::ok(PATTERN_REPLY),
        _ => Reply::ok("I mapped the opportunities: onboarding is the big one."),
    });
    let err = synthesizer(generator, PipelineConfig::default())
        .run(&onboarding_sources(), &[], None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SynthesisError::MalformedResponse {
            stage: Stage::Mapping,
            ..
        }
    ));
    assert!(err.to_string().starts_with("mapping stage"));
}

#[tokio::test]
async fn generator_failure_names_stage() {
    let generator = Scripted::new(|stage, prompt| match stage {
        Stage::Extraction => Reply::ok(extraction_reply(prompt)),
        _ => Reply::fail("rate limited"),
    });
    let err = synthesizer(generator, PipelineConfig::default())
        .run(&onboarding_sources(), &[], None)
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Patterns));
    assert!(err.to_string().contains("rate limited"));
}

#[tokio::test]
async fn slow_call_times_out() {
    let generator = Scripted::new(|stage, prompt| match stage {
        Stage::Extraction => Reply::ok(extraction_reply(prompt)),
        _ => Reply::ok("[]").after(Duration::from_secs(30)),
    });
    let pipeline = PipelineConfig {
        call_timeout_secs: 1,
        ..PipelineConfig::default()
    };
    let err = synthesizer(generator, pipeline)
        .run(&onboarding_sources(), &[], None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SynthesisError::Timeout {
            stage: Stage::Patterns,
            timeout_secs: 1
        }
    ));
}

#[tokio::test]
async fn cancelled_before_start_makes_no_calls() {
    let generator = happy_path();
    let token = CancellationToken::new();
    token.cancel();
    let err = synthesizer(generator.clone(), PipelineConfig::default())
        .with_cancel(token)
        .run(&onboarding_sources(), &[], None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SynthesisError::Cancelled {
            stage: Stage::Extraction
        }
    ));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn cancellation_stops_at_next_stage() {
    let token = CancellationToken::new();
    let trip = token.clone();
    let generator = Scripted::new(move |stage, prompt| {
        trip.cancel();
        match stage {
            Stage::Extraction => Reply::ok(extraction_reply(prompt)),
            _ => Reply::ok("[]"),
        }
    });
    let err = synthesizer(generator.clone(), PipelineConfig::default())
        .with_cancel(token)
        .run(&onboarding_sources(), &[], None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SynthesisError::Cancelled {
            stage: Stage::Patterns
        }
    ));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn input_validated_before_any_call() {
    let generator = happy_path();
    let synth = synthesizer(generator.clone(), PipelineConfig::default());
    let sources = onboarding_sources();

    let err = synth
        .run(&sources, &outcomes(&["a", "b", "c", "d"]), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SynthesisError::TooManyOutcomes { given: 4, max: 3 }
    ));

    let err = synth.run(&[], &[], None).await.unwrap_err();
    assert!(matches!(err, SynthesisError::NoSources));

    let mut dup = sources.clone();
    dup.push(sources[0].clone());
    let err = synth.run(&dup, &[], None).await.unwrap_err();
    assert!(matches!(err, SynthesisError::DuplicateSourceId(ref id) if id == "customer_calls_000"));

    let mut odd = sources.clone();
    odd[1].category = "podcasts".into();
    let err = synth.run(&odd, &[], None).await.unwrap_err();
    assert!(matches!(err, SynthesisError::UnknownCategory { .. }));

    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn blank_outcomes_do_not_count() {
    let generator = happy_path();
    let result = synthesizer(generator, PipelineConfig::default())
        .run(
            &onboarding_sources(),
            &outcomes(&["Reduce time to first value", " ", "", "\t"]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(result.desired_outcomes.len(), 1);
}

// ── Progress ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_is_monotone_and_ends_at_100() {
    let seen = Arc::new(Mutex::new(Vec::<(String, u8)>::new()));
    let sink = seen.clone();
    let callback = move |label: &str, pct: u8| sink.lock().unwrap().push((label.to_string(), pct));

    synthesizer(happy_path(), pipeline_with(10, 2))
        .run(&many_sources(25), &[], Some(&callback as &ProgressFn))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    let pcts: Vec<u8> = seen.iter().map(|(_, p)| *p).collect();
    assert!(pcts.windows(2).all(|w| w[0] <= w[1]), "{pcts:?}");
    assert_eq!(pcts.first(), Some(&5));
    assert_eq!(seen.last().map(|(l, p)| (l.as_str(), *p)), Some(("Synthesis complete!", 100)));
    assert!(pcts.contains(&40));
    assert!(pcts.contains(&70));
}

#[tokio::test]
async fn failed_run_never_reports_100() {
    let seen = Arc::new(Mutex::new(Vec::<u8>::new()));
    let sink = seen.clone();
    let callback = move |_: &str, pct: u8| sink.lock().unwrap().push(pct);
    let generator = Scripted::new(|_, _| Reply::fail("down"));

    let _ = synthesizer(generator, PipelineConfig::default())
        .run(&onboarding_sources(), &[], Some(&callback as &ProgressFn))
        .await;
    assert!(!seen.lock().unwrap().contains(&100));
}
