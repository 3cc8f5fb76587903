//! The three model-backed stages of the pyramid.
//!
//! Each stage builds its prompt, makes its call(s) through
//! [`call_model`], validates the response shape and repairs the parsed
//! records against the run's sources.

pub mod extraction;
pub mod mapping;
pub mod patterns;

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Result, Stage, SynthesisError};
use crate::generator::{StopReason, TextGenerator};

/// One generator call with the stage's timeout and stop-reason checks.
///
/// A reply cut off at the token cap is fatal; its text is never parsed.
pub(crate) async fn call_model(
    generator: &dyn TextGenerator,
    stage: Stage,
    system: &str,
    user: &str,
    timeout_secs: u64,
) -> Result<String> {
    let start = Instant::now();
    let generation = match tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        generator.generate(system, user),
    )
    .await
    {
        Ok(Ok(generation)) => generation,
        Ok(Err(source)) => {
            warn!(
                stage = %stage,
                transient = source.is_transient(),
                error = %source,
                "model call failed"
            );
            return Err(SynthesisError::Generator { stage, source });
        }
        Err(_) => {
            return Err(SynthesisError::Timeout {
                stage,
                timeout_secs,
            });
        }
    };

    debug!(
        stage = %stage,
        prompt_chars = user.len(),
        response_chars = generation.text.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "model call finished"
    );

    match generation.stop {
        StopReason::Complete => Ok(generation.text),
        StopReason::MaxTokens => Err(SynthesisError::OutputTruncated { stage }),
        StopReason::Other => {
            warn!(stage = %stage, "model stopped for an unrecognized reason");
            Ok(generation.text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{Generation, GeneratorError};
    use async_trait::async_trait;

    struct Reply(Generation);

    #[async_trait]
    impl TextGenerator for Reply {
        async fn generate(&self, _: &str, _: &str) -> std::result::Result<Generation, GeneratorError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(&self, _: &str, _: &str) -> std::result::Result<Generation, GeneratorError> {
            Err(GeneratorError::Other("connection reset".into()))
        }
    }

    struct Stalled;

    #[async_trait]
    impl TextGenerator for Stalled {
        async fn generate(&self, _: &str, _: &str) -> std::result::Result<Generation, GeneratorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Generation::complete("[]"))
        }
    }

    #[tokio::test]
    async fn complete_reply_passes_through() {
        let text = call_model(&Reply(Generation::complete("[]")), Stage::Patterns, "s", "u", 5)
            .await
            .unwrap();
        assert_eq!(text, "[]");
    }

    #[tokio::test]
    async fn truncated_reply_is_fatal() {
        let err = call_model(&Reply(Generation::truncated("[{")), Stage::Extraction, "s", "u", 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::OutputTruncated {
                stage: Stage::Extraction
            }
        ));
    }

    #[tokio::test]
    async fn generator_failure_names_stage() {
        let err = call_model(&Failing, Stage::Mapping, "s", "u", 5).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Mapping));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let err = call_model(&Stalled, Stage::Patterns, "s", "u", 1).await.unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::Timeout {
                stage: Stage::Patterns,
                timeout_secs: 1
            }
        ));
    }
}
