//! # oppstree-types
//!
//! Core type definitions for the oppstree synthesis pipeline.
//!
//! This crate is the foundation of the dependency graph -- every other
//! oppstree crate depends on it. It contains:
//!
//! - **[`category`]** -- the configured source categories and their weights
//! - **[`source`]** -- normalized input documents ([`Source`])
//! - **[`insight`]** -- per-source extraction output ([`ExtractedInsight`])
//! - **[`pattern`]** -- cross-source patterns ([`Pattern`])
//! - **[`ost`]** -- the Opportunity Solution Tree result ([`OstResult`])
//! - **[`config`]** -- configuration schema
//! - **[`error`]** -- [`ConfigError`]

pub mod category;
pub mod config;
pub mod error;
pub mod insight;
pub mod ost;
pub mod pattern;
pub mod source;

pub use category::{CategoryBreakdown, CategoryInfo, CategoryRegistry};
pub use config::{Config, PipelineConfig, ProviderApi, ProviderConfig};
pub use error::{ConfigError, Result};
pub use insight::{ExtractedInsight, PainPoint, Problem, Severity};
pub use ost::{
    CategorySummary, CrossCuttingTheme, DesiredOutcome, EvidenceEntry, EvidenceStrength,
    Opportunity, OpportunityProblem, OstResult, OutcomeOrigin, SolutionOption, SourcesSummary,
};
pub use pattern::{Pattern, PatternEvidence};
pub use source::Source;
