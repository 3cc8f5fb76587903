//! Run orchestration: validate inputs, then extraction → patterns →
//! mapping → assembly, strictly in order.
//!
//! Any stage failure aborts the run; no partial result is returned.
//! Cancellation is cooperative and checked at stage boundaries (and
//! before each extraction batch). An in-flight model call is never
//! preempted.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use oppstree_types::{CategoryRegistry, Config, OstResult, PipelineConfig, Source};

use crate::assembler;
use crate::error::{Result, Stage, SynthesisError};
use crate::generator::TextGenerator;
use crate::stages::{extraction, mapping, patterns};

/// Progress callback: `(label, percent)`. May borrow from the caller.
pub type ProgressFn<'a> = dyn Fn(&str, u8) + Send + Sync + 'a;

pub const PROGRESS_LOADING: (&str, u8) = ("Loading and structuring sources...", 5);
pub const PROGRESS_EXTRACTING: (&str, u8) = ("Categorizing content from each source...", 10);
pub const PROGRESS_PATTERNS: (&str, u8) = ("Identifying cross-source patterns...", 40);
pub const PROGRESS_MAPPING: (&str, u8) = ("Mapping opportunity spaces...", 70);
pub const PROGRESS_DONE: (&str, u8) = ("Synthesis complete!", 100);

/// Drives one or more synthesis runs against a shared generator.
pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
    pipeline: PipelineConfig,
    registry: CategoryRegistry,
    cancel: Option<CancellationToken>,
}

impl Synthesizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        pipeline: PipelineConfig,
        registry: CategoryRegistry,
    ) -> Self {
        Self {
            generator,
            pipeline,
            registry,
            cancel: None,
        }
    }

    /// Take pipeline settings and categories from a loaded config.
    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &Config) -> Self {
        Self::new(generator, config.pipeline.clone(), config.categories.clone())
    }

    /// Set a cancellation token for cooperative shutdown.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Run the full pipeline over `sources`.
    ///
    /// Input is validated before any model call: at least one source,
    /// unique ids, configured categories, and no more desired outcomes
    /// than `max_desired_outcomes` (blank statements are ignored).
    pub async fn run(
        &self,
        sources: &[Source],
        desired_outcomes: &[String],
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<OstResult> {
        let outcomes = self.validate(sources, desired_outcomes)?;

        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("synthesis", run_id = %run_id);
        self.run_stages(run_id, sources, &outcomes, Progress::new(progress))
            .instrument(span)
            .await
    }

    fn validate(&self, sources: &[Source], desired_outcomes: &[String]) -> Result<Vec<String>> {
        self.pipeline.validate()?;
        self.registry.validate()?;

        if sources.is_empty() {
            return Err(SynthesisError::NoSources);
        }

        let outcomes: Vec<String> = desired_outcomes
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
        if outcomes.len() > self.pipeline.max_desired_outcomes {
            return Err(SynthesisError::TooManyOutcomes {
                given: outcomes.len(),
                max: self.pipeline.max_desired_outcomes,
            });
        }

        let mut ids = HashSet::with_capacity(sources.len());
        for s in sources {
            if !ids.insert(s.id.as_str()) {
                return Err(SynthesisError::DuplicateSourceId(s.id.clone()));
            }
            if !self.registry.contains(&s.category) {
                return Err(SynthesisError::UnknownCategory {
                    source_id: s.id.clone(),
                    category: s.category.clone(),
                });
            }
        }

        Ok(outcomes)
    }

    async fn run_stages(
        &self,
        run_id: String,
        sources: &[Source],
        outcomes: &[String],
        progress: Progress<'_>,
    ) -> Result<OstResult> {
        let start = Instant::now();
        let generator = self.generator.as_ref();
        info!(
            sources = sources.len(),
            outcomes = outcomes.len(),
            "synthesis started"
        );
        progress.report(PROGRESS_LOADING);

        self.checkpoint(Stage::Extraction)?;
        progress.report(PROGRESS_EXTRACTING);
        let on_batch = |done: usize, total: usize| {
            let span = (PROGRESS_PATTERNS.1 - PROGRESS_EXTRACTING.1) as usize;
            let pct = PROGRESS_EXTRACTING.1 as usize + span * done / total.max(1);
            let label = format!("Categorized batch {done} of {total}");
            progress.report((label.as_str(), pct as u8));
        };
        let insights = extraction::extract_insights(
            generator,
            sources,
            &self.registry,
            &self.pipeline,
            self.cancel.as_ref(),
            &on_batch,
        )
        .await?;

        self.checkpoint(Stage::Patterns)?;
        progress.report(PROGRESS_PATTERNS);
        let patterns = patterns::find_patterns(
            generator,
            sources,
            &insights,
            &self.registry,
            &self.pipeline,
        )
        .await?;

        self.checkpoint(Stage::Mapping)?;
        progress.report(PROGRESS_MAPPING);
        let mapping = mapping::map_opportunities(
            generator,
            sources,
            &patterns,
            outcomes,
            &self.registry,
            &self.pipeline,
        )
        .await?;

        self.checkpoint(Stage::Assembly)?;
        let result = assembler::assemble(
            run_id,
            Utc::now(),
            mapping,
            sources,
            &self.registry,
            start.elapsed(),
        );

        info!(
            insights = insights.len(),
            patterns = patterns.len(),
            opportunities = result.total_opportunities(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "synthesis complete"
        );
        progress.report(PROGRESS_DONE);
        Ok(result)
    }

    fn checkpoint(&self, stage: Stage) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                info!(stage = %stage, "synthesis cancelled");
                Err(SynthesisError::Cancelled { stage })
            }
            _ => Ok(()),
        }
    }
}

/// Forwards progress to the caller, never letting the percentage go
/// backwards (batches can finish out of order).
struct Progress<'a> {
    callback: Option<&'a ProgressFn<'a>>,
    last: Mutex<u8>,
}

impl<'a> Progress<'a> {
    fn new(callback: Option<&'a ProgressFn<'a>>) -> Self {
        Self {
            callback,
            last: Mutex::new(0),
        }
    }

    fn report(&self, (label, percent): (&str, u8)) {
        let Some(callback) = self.callback else {
            return;
        };
        let percent = {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            *last = (*last).max(percent.min(100));
            *last
        };
        callback(label, percent);
    }
}
