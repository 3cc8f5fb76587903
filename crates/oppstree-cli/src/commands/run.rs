//! `ost run`: synthesize an Opportunity Solution Tree from local files.
//!
//! # Examples
//!
//! ```text
//! ost run -i customer_calls=./calls -i support_tickets=./tickets.csv
//! ost run -i customer_calls=./calls --outcome "Reduce onboarding time" -o session.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use oppstree_core::{ProgressFn, ProviderGenerator, Synthesizer};
use oppstree_types::{Config, OstResult, Source};

use crate::config_loader::load_config;
use crate::loader::{InputSpec, load_sources};

/// Arguments for `ost run`.
#[derive(Args)]
pub struct RunArgs {
    /// Source input as `<category>=<file-or-directory>`. Repeatable.
    #[arg(short, long = "input", value_name = "CATEGORY=PATH", required = true)]
    pub inputs: Vec<InputSpec>,

    /// Desired outcome statement. Repeatable; omit to let the model infer.
    #[arg(long = "outcome", value_name = "TEXT")]
    pub outcomes: Vec<String>,

    /// Session file to write.
    #[arg(short, long, default_value = "ost-session.json")]
    pub output: PathBuf,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the routed model (e.g. `openai/gpt-4o`).
    #[arg(long)]
    pub model: Option<String>,

    /// Override sources per extraction batch.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Override concurrent extraction batches.
    #[arg(long)]
    pub parallelism: Option<usize>,
}

/// What `ost run` persists: the sources and the tree built from them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Session {
    pub sources: Vec<Source>,
    pub result: OstResult,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref()).await?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let sources = load_sources(
        &args.inputs,
        &config.categories,
        config.pipeline.max_chars_per_source,
    )
    .await?;
    if sources.is_empty() {
        anyhow::bail!("no readable sources found in the given inputs");
    }
    info!(sources = sources.len(), model = %config.model, "starting synthesis");

    let generator = ProviderGenerator::from_config(&config)?;

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl+C, stopping after the current model call...");
            cancel_for_signal.cancel();
        }
    });

    let synthesizer = Synthesizer::from_config(Arc::new(generator), &config).with_cancel(cancel);
    let progress: &ProgressFn = &|label: &str, pct: u8| eprintln!("[{pct:>3}%] {label}");
    let result = synthesizer
        .run(&sources, &args.outcomes, Some(progress))
        .await?;

    let session = Session { sources, result };
    write_session(&args.output, &session).await?;

    println!("{}", summary_table(&session.result));
    println!(
        "  {} sources, {} opportunities, {} problems, {} solutions in {:.1}s",
        session.result.sources_summary.total,
        session.result.total_opportunities(),
        session.result.total_problems(),
        session.result.total_solutions(),
        session.result.processing_time_secs,
    );
    println!("  Session: {}", args.output.display());
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(n) = args.batch_size {
        config.pipeline.batch_size = n;
    }
    if let Some(n) = args.parallelism {
        config.pipeline.parallelism = n;
    }
}

pub async fn write_session(path: &Path, session: &Session) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(session)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| anyhow::anyhow!("failed to write session {}: {e}", path.display()))?;
    Ok(())
}

/// Top opportunities across all outcomes, highest score first.
pub fn summary_table(result: &OstResult) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["#", "OPPORTUNITY", "EVIDENCE", "SCORE", "SOURCES", "OUTCOME"]);

    for (rank, opp) in result.opportunities().into_iter().enumerate() {
        let outcome = result
            .desired_outcomes
            .iter()
            .find(|o| o.opportunities.iter().any(|x| std::ptr::eq(x, opp)))
            .map(|o| o.statement.clone())
            .unwrap_or_default();
        table.add_row(vec![
            (rank + 1).to_string(),
            opp.name.clone(),
            opp.evidence_strength.to_string(),
            format!("{:.1}", opp.weighted_score),
            opp.source_count.to_string(),
            outcome,
        ]);
    }
    table
}
