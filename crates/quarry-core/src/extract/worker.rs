//! Per-chunk extraction with bounded attempts, retries, and timeouts.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::chunker::Chunk;
use crate::config::ExtractionConfig;
use crate::extract::parse::parse_extraction;
use crate::extract::progress::ProgressRegistry;
use crate::extract::prompt::extraction_prompt;
use crate::traits::{GenerationOptions, Llm, ResponseFormat};
use crate::types::{ExtractionResult, Message};

/// Terminal state of one chunk's extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// A parseable result with at least one entity or relationship.
    Succeeded(ExtractionResult),
    /// Every retry parsed cleanly but carried no content.
    Empty,
    /// Attempts exhausted on call errors, timeouts, or unparseable output.
    Failed,
}

/// What a single round of attempts produced.
enum AttemptOutcome {
    Extracted(ExtractionResult),
    Empty,
    Exhausted,
}

/// Runs the extraction state machine for single chunks.
///
/// `extract` never returns an error: a chunk that cannot be extracted ends
/// as [`ChunkOutcome::Failed`] and the batch moves on.
pub struct ChunkExtractor {
    llm: Arc<dyn Llm>,
    config: ExtractionConfig,
    progress: ProgressRegistry,
}

impl ChunkExtractor {
    pub fn new(llm: Arc<dyn Llm>, config: ExtractionConfig, progress: ProgressRegistry) -> Self {
        Self {
            llm,
            config,
            progress,
        }
    }

    /// Drive one chunk to a terminal state.
    ///
    /// Empty results are retried up to `max_retries` times on top of the
    /// initial round; each round gets `max_attempts` tries at a parseable
    /// response. The first LLM call of the first round uses the long
    /// cold-start timeout, every later call the short one.
    pub async fn extract(&self, chunk: &Chunk) -> ChunkOutcome {
        let mut first_call = true;
        let rounds = self.config.max_retries + 1;

        for round in 1..=rounds {
            match self.attempt_round(chunk, &mut first_call).await {
                AttemptOutcome::Extracted(result) => {
                    self.progress.finish(chunk.index);
                    info!(
                        chunk = chunk.index,
                        entities = result.entities.len(),
                        relationships = result.relationships.len(),
                        "chunk extracted"
                    );
                    return ChunkOutcome::Succeeded(result);
                }
                AttemptOutcome::Empty => {
                    if round < rounds {
                        info!(chunk = chunk.index, round, "empty result, retrying");
                    }
                }
                AttemptOutcome::Exhausted => {
                    self.progress.finish(chunk.index);
                    warn!(
                        chunk = chunk.index,
                        attempts = self.config.max_attempts,
                        "extraction failed, all attempts exhausted"
                    );
                    return ChunkOutcome::Failed;
                }
            }
        }

        self.progress.finish(chunk.index);
        warn!(
            chunk = chunk.index,
            retries = self.config.max_retries,
            "no entities or relationships after all retries"
        );
        ChunkOutcome::Empty
    }

    /// One round: up to `max_attempts` LLM calls, each under a hard
    /// client-side deadline. On expiry the request future is dropped; the
    /// remote service may keep computing until its own timeout.
    async fn attempt_round(&self, chunk: &Chunk, first_call: &mut bool) -> AttemptOutcome {
        let messages = [Message::user(extraction_prompt(&chunk.text))];
        let options = GenerationOptions {
            response_format: Some(ResponseFormat::Json),
            ..Default::default()
        };

        for attempt in 1..=self.config.max_attempts {
            let deadline = attempt_deadline(&self.config, *first_call);
            *first_call = false;

            self.progress.update(chunk.index, "llm_call");
            debug!(
                chunk = chunk.index,
                attempt,
                timeout_secs = deadline.as_secs(),
                "requesting extraction"
            );

            let response = match tokio::time::timeout(
                deadline,
                self.llm.generate(&messages, Some(options.clone())),
            )
            .await
            {
                Err(_) => {
                    warn!(
                        chunk = chunk.index,
                        attempt,
                        timeout_secs = deadline.as_secs(),
                        "extraction attempt timed out"
                    );
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(chunk = chunk.index, attempt, error = %e, "LLM call failed");
                    continue;
                }
                Ok(Ok(response)) => response,
            };

            self.progress.update(chunk.index, "parse");
            match parse_extraction(response.content_or_empty()) {
                Ok(result) if result.is_empty() => return AttemptOutcome::Empty,
                Ok(result) => return AttemptOutcome::Extracted(result),
                Err(e) => {
                    warn!(chunk = chunk.index, attempt, error = %e, "unparseable extraction response");
                    continue;
                }
            }
        }

        AttemptOutcome::Exhausted
    }
}

/// Timeout for the upcoming call given whether it is the first on its chunk.
pub(crate) fn attempt_deadline(config: &ExtractionConfig, first_call: bool) -> Duration {
    if first_call {
        config.first_attempt_timeout()
    } else {
        config.retry_timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunk;
    use crate::error::QuarryError;
    use crate::traits::LlmResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed sequence of canned responses, then repeats the last.
    struct ScriptedLlm {
        responses: Vec<Result<String, ()>>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String, ()>>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Llm for ScriptedLlm {
        async fn generate(
            &self,
            _messages: &[Message],
            _options: Option<GenerationOptions>,
        ) -> crate::error::QuarryResult<LlmResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self
                .responses
                .get(call)
                .or_else(|| self.responses.last())
                .cloned()
                .unwrap_or(Err(()));
            match scripted {
                Ok(content) => Ok(LlmResponse {
                    content: Some(content),
                    usage: None,
                }),
                Err(()) => Err(QuarryError::llm_connection("scripted connection failure")),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    /// Never completes; exercises the attempt deadline.
    struct HangingLlm;

    #[async_trait]
    impl Llm for HangingLlm {
        async fn generate(
            &self,
            _messages: &[Message],
            _options: Option<GenerationOptions>,
        ) -> crate::error::QuarryResult<LlmResponse> {
            std::future::pending().await
        }

        fn model_name(&self) -> &str {
            "hanging"
        }
    }

    fn chunk(text: &str) -> Chunk {
        Chunk {
            index: 0,
            text: text.to_string(),
            source: None,
            overlap: 0,
        }
    }

    fn fast_config() -> ExtractionConfig {
        ExtractionConfig {
            first_attempt_timeout_secs: 1,
            retry_timeout_secs: 1,
            ..Default::default()
        }
    }

    const GOOD: &str =
        r#"{"entities": [{"id": "e1", "type": "Person", "name": "Elias"}], "relationships": []}"#;
    const EMPTY: &str = r#"{"entities": [], "relationships": []}"#;

    #[tokio::test]
    async fn test_clean_response_succeeds_first_try() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(GOOD.to_string())]));
        let extractor =
            ChunkExtractor::new(llm.clone(), fast_config(), ProgressRegistry::new());
        let outcome = extractor.extract(&chunk("text")).await;
        assert!(matches!(outcome, ChunkOutcome::Succeeded(ref r) if r.entities.len() == 1));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_garbage_then_good_uses_second_attempt() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("not json at all".to_string()),
            Ok(GOOD.to_string()),
        ]));
        let extractor =
            ChunkExtractor::new(llm.clone(), fast_config(), ProgressRegistry::new());
        let outcome = extractor.extract(&chunk("text")).await;
        assert!(matches!(outcome, ChunkOutcome::Succeeded(_)));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_persistent_connection_failure_fails_chunk() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(())]));
        let config = fast_config();
        let extractor = ChunkExtractor::new(llm.clone(), config.clone(), ProgressRegistry::new());
        let outcome = extractor.extract(&chunk("text")).await;
        assert_eq!(outcome, ChunkOutcome::Failed);
        // One round only: errors exhaust attempts without empty-retries.
        assert_eq!(llm.call_count(), config.max_attempts as usize);
    }

    #[tokio::test]
    async fn test_persistent_empty_exhausts_retries() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(EMPTY.to_string())]));
        let config = fast_config();
        let extractor = ChunkExtractor::new(llm.clone(), config.clone(), ProgressRegistry::new());
        let outcome = extractor.extract(&chunk("text")).await;
        assert_eq!(outcome, ChunkOutcome::Empty);
        // One call per round: initial round plus max_retries retries.
        assert_eq!(llm.call_count(), (config.max_retries + 1) as usize);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failed_attempt() {
        let extractor = ChunkExtractor::new(
            Arc::new(HangingLlm),
            ExtractionConfig {
                first_attempt_timeout_secs: 0,
                retry_timeout_secs: 0,
                ..Default::default()
            },
            ProgressRegistry::new(),
        );
        let outcome = extractor.extract(&chunk("text")).await;
        assert_eq!(outcome, ChunkOutcome::Failed);
    }

    #[tokio::test]
    async fn test_progress_cleared_on_terminal_state() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(GOOD.to_string())]));
        let progress = ProgressRegistry::new();
        let extractor = ChunkExtractor::new(llm, fast_config(), progress.clone());
        extractor.extract(&chunk("text")).await;
        assert_eq!(progress.active(), 0);
    }

    #[test]
    fn test_attempt_deadline_switches_after_first_call() {
        let config = ExtractionConfig::default();
        assert_eq!(attempt_deadline(&config, true), Duration::from_secs(1200));
        assert_eq!(attempt_deadline(&config, false), Duration::from_secs(120));
    }
}
