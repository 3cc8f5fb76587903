//! Synthesis pipeline for oppstree.
//!
//! Turns categorized product-feedback [`Source`](oppstree_types::Source)s
//! into an Opportunity Solution Tree in three model-backed stages:
//!
//! 1. **Extraction** (level 2): batched per-source insights.
//! 2. **Patterns** (level 3): cross-source themes with weighted scores.
//! 3. **Mapping** (level 4): desired outcomes, opportunity spaces and
//!    solution options.
//!
//! Model output is validated for shape, then repaired: every score, count
//! and breakdown that can be derived from evidence is recomputed from the
//! run's sources, and references to unknown sources are dropped.
//!
//! The model is reached through the [`TextGenerator`] trait; production
//! code uses [`ProviderGenerator`], tests inject scripted generators.

pub mod assembler;
pub mod error;
pub mod generator;
pub mod prompts;
pub mod response;
pub mod scoring;
pub mod serializer;
pub mod stages;
pub mod synthesizer;

pub use error::{Result, Stage, SynthesisError};
pub use generator::{Generation, GeneratorError, ProviderGenerator, StopReason, TextGenerator};
pub use stages::mapping::MappingOutput;
pub use synthesizer::{ProgressFn, Synthesizer};
