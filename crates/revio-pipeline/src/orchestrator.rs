//! Pipeline orchestration: sequences the stages into one generation call.
//!
//! `clean → (summarize if long) → detect → cluster → format → validate`.
//!
//! Error routing follows the stage contracts: extraction failures are
//! permanent and propagate as-is; summarization failures and timeouts are
//! transient and propagate for the job layer to retry; clustering never
//! fails (it degrades to the type-grouping fallback internally).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use revio_core::{
    defaults, EmbeddingBackend, Error, InferenceBackend, Result, ReviewerDocument,
    SummarizationBackend,
};

use crate::cleaner::clean;
use crate::cluster::cluster_concepts;
use crate::detector::detect_concepts;
use crate::formatter::ReviewerDocumentBuilder;
use crate::quality::validate;

/// Tunables for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Cleaned text longer than this is abstractively summarized before
    /// concept detection.
    pub summarize_threshold_chars: usize,
    /// Word target for the summarization backend.
    pub summarize_max_words: usize,
    /// Upper bound on one summarization call.
    pub summarize_timeout: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            summarize_threshold_chars: defaults::SUMMARIZE_THRESHOLD_CHARS,
            summarize_max_words: defaults::SUMMARIZE_MAX_WORDS,
            summarize_timeout: Duration::from_secs(defaults::SUMMARIZE_TIMEOUT_SECS),
        }
    }
}

impl OrchestratorOptions {
    /// Load options from environment variables with fallback to defaults.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `REVIO_SUMMARIZE_THRESHOLD_CHARS` | `6000` | Summarize spans longer than this |
    /// | `REVIO_SUMMARIZE_TIMEOUT_SECS` | `60` | Per-call summarization timeout |
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(val) = std::env::var("REVIO_SUMMARIZE_THRESHOLD_CHARS") {
            if let Ok(n) = val.parse::<usize>() {
                options.summarize_threshold_chars = n;
            } else {
                warn!(value = %val, "Invalid REVIO_SUMMARIZE_THRESHOLD_CHARS, using default");
            }
        }

        if let Ok(val) = std::env::var("REVIO_SUMMARIZE_TIMEOUT_SECS") {
            if let Ok(n) = val.parse::<u64>() {
                options.summarize_timeout = Duration::from_secs(n);
            } else {
                warn!(value = %val, "Invalid REVIO_SUMMARIZE_TIMEOUT_SECS, using default");
            }
        }

        options
    }
}

/// Runs the full generation pipeline for one material.
pub struct ReviewerOrchestrator {
    backend: Arc<dyn InferenceBackend>,
    options: OrchestratorOptions,
}

impl ReviewerOrchestrator {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            backend,
            options: OrchestratorOptions::default(),
        }
    }

    pub fn with_options(backend: Arc<dyn InferenceBackend>, options: OrchestratorOptions) -> Self {
        Self { backend, options }
    }

    /// Generate a reviewer document from raw extracted text.
    pub async fn generate(&self, material_id: Uuid, raw_text: &str) -> Result<ReviewerDocument> {
        let started = Instant::now();

        let cleaned = clean(raw_text)?;

        // models_used records only models that actually ran. Both
        // supertraits expose `model_name`, so the calls are qualified.
        let mut models_used = Vec::new();
        let text = if cleaned.len() > self.options.summarize_threshold_chars {
            let summary = self.summarize_bounded(&cleaned).await?;
            models_used
                .push(SummarizationBackend::model_name(self.backend.as_ref()).to_string());
            summary
        } else {
            cleaned
        };

        let concepts = detect_concepts(&text);
        if concepts.is_empty() {
            return Err(Error::ExtractionFailure(
                "no concepts detected in cleaned text".to_string(),
            ));
        }

        let clustering = cluster_concepts(&concepts, self.backend.as_ref()).await;
        if clustering.used_embeddings {
            models_used.push(EmbeddingBackend::model_name(self.backend.as_ref()).to_string());
        }
        let topics = clustering.topics;

        let mut document = ReviewerDocumentBuilder::new(material_id)
            .topics(topics)
            .concepts(concepts)
            .models_used(models_used)
            .build();
        document.quality = validate(&document);

        if !document.quality.meets_threshold() {
            warn!(
                material_id = %material_id,
                overall = document.quality.overall,
                issues = document.quality.issues.len(),
                "Generated document is below the quality gate"
            );
        }

        info!(
            material_id = %material_id,
            topic_count = document.topics.len(),
            overall = document.quality.overall,
            duration_ms = started.elapsed().as_millis() as u64,
            "Reviewer document generated"
        );
        Ok(document)
    }

    /// One summarization call, bounded by the configured timeout. Timeouts
    /// and empty outputs are transient backend errors.
    async fn summarize_bounded(&self, text: &str) -> Result<String> {
        let call = self
            .backend
            .summarize(text, self.options.summarize_max_words);
        let summary = timeout(self.options.summarize_timeout, call)
            .await
            .map_err(|_| {
                Error::BackendTimeout(format!(
                    "summarization exceeded {}s",
                    self.options.summarize_timeout.as_secs()
                ))
            })??;

        if summary.trim().is_empty() {
            return Err(Error::Backend("summarization returned empty output".to_string()));
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use revio_core::{EmbeddingBackend, SummarizationBackend};

    /// Deterministic in-process backend: keyword-axis embeddings and a
    /// truncating summarizer.
    struct StubBackend {
        summarize_delay: Duration,
        embed_fails: bool,
    }

    impl StubBackend {
        fn instant() -> Self {
            Self {
                summarize_delay: Duration::ZERO,
                embed_fails: false,
            }
        }
    }

    #[async_trait]
    impl EmbeddingBackend for StubBackend {
        async fn embed(&self, text: &str) -> revio_core::Result<Vec<f32>> {
            if self.embed_fails {
                return Err(Error::Backend("embedding unavailable".to_string()));
            }
            let lower = text.to_lowercase();
            let mut v = vec![0.01f32; 4];
            if lower.contains("array") || lower.contains("list") || lower.contains("stack") {
                v[0] = 1.0;
            }
            if lower.contains("cell") || lower.contains("osmosis") {
                v[1] = 1.0;
            }
            Ok(v)
        }

        fn dimension(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "stub-embed"
        }
    }

    #[async_trait]
    impl SummarizationBackend for StubBackend {
        async fn summarize(&self, text: &str, max_words: usize) -> revio_core::Result<String> {
            if !self.summarize_delay.is_zero() {
                tokio::time::sleep(self.summarize_delay).await;
            }
            let words: Vec<&str> = text.split_whitespace().take(max_words).collect();
            Ok(words.join(" "))
        }

        fn model_name(&self) -> &str {
            "stub-summarize"
        }
    }

    #[async_trait]
    impl InferenceBackend for StubBackend {
        async fn health_check(&self) -> revio_core::Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn generates_accepted_document_from_study_notes() {
        let orchestrator = ReviewerOrchestrator::new(Arc::new(StubBackend::instant()));
        let raw = "Array vs Linked List: contiguous memory with O(1) index access vs \
                   dynamic node allocation with O(n) traversal\n\
                   Stack: a LIFO data structure supporting push and pop operations\n\
                   Osmosis is the movement of water across a semipermeable membrane\n\
                   Cell membrane: the lipid bilayer enclosing every living cell";

        let doc = orchestrator.generate(Uuid::nil(), raw).await.unwrap();

        assert!(doc.topics.len() >= 2);
        assert!(doc.quality.meets_threshold(), "quality: {:?}", doc.quality);
        assert!(doc.rendered_text.contains("Array vs Linked List"));
        assert_eq!(doc.metadata.pipeline_version, defaults::PIPELINE_VERSION);
        assert_eq!(doc.metadata.models_used, vec!["stub-embed"]);
    }

    #[tokio::test]
    async fn degraded_clustering_omits_embedding_model_from_metadata() {
        let backend = StubBackend {
            summarize_delay: Duration::ZERO,
            embed_fails: true,
        };
        let orchestrator = ReviewerOrchestrator::new(Arc::new(backend));
        let raw = "Stack: a LIFO data structure supporting push and pop operations\n\
                   Osmosis is the movement of water across a semipermeable membrane";

        let doc = orchestrator.generate(Uuid::nil(), raw).await.unwrap();

        // Clustering fell back to type grouping; no model actually ran.
        assert!(doc.metadata.models_used.is_empty());
        assert!(!doc.topics.is_empty());
    }

    #[tokio::test]
    async fn empty_input_is_permanent_extraction_failure() {
        let orchestrator = ReviewerOrchestrator::new(Arc::new(StubBackend::instant()));
        let err = orchestrator.generate(Uuid::nil(), "  • … \n").await.unwrap_err();
        assert!(matches!(err, Error::ExtractionFailure(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn long_input_is_summarized_first() {
        let options = OrchestratorOptions {
            summarize_threshold_chars: 200,
            ..OrchestratorOptions::default()
        };
        let orchestrator =
            ReviewerOrchestrator::with_options(Arc::new(StubBackend::instant()), options);

        // Distinct sentences so the cleaner's near-duplicate removal keeps
        // them all and the cleaned text genuinely exceeds the threshold.
        let mut raw = String::from("Stack: a LIFO data structure supporting push and pop\n");
        raw.push_str("Osmosis is the movement of water across a semipermeable membrane.\n");
        raw.push_str("Binary search halves the search interval on each comparison.\n");
        raw.push_str("Photosynthesis converts light energy into chemical energy inside plant cells.\n");
        raw.push_str("The mitochondrion generates most of the chemical energy a cell needs.\n");

        let doc = orchestrator.generate(Uuid::nil(), &raw).await.unwrap();
        assert!(doc.metadata.models_used.contains(&"stub-summarize".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn summarization_timeout_is_transient() {
        let options = OrchestratorOptions {
            summarize_threshold_chars: 100,
            summarize_timeout: Duration::from_secs(1),
            ..OrchestratorOptions::default()
        };
        let backend = StubBackend {
            summarize_delay: Duration::from_secs(30),
            embed_fails: false,
        };
        let orchestrator = ReviewerOrchestrator::with_options(Arc::new(backend), options);

        // Distinct sentences so the cleaner's near-duplicate removal keeps
        // them all and the cleaned text genuinely exceeds the threshold.
        let raw = "Stack: a LIFO data structure supporting push and pop operations. \
                   Osmosis is the movement of water across a semipermeable membrane. \
                   Binary search halves the search interval on each comparison."
            .to_string();
        let err = orchestrator.generate(Uuid::nil(), &raw).await.unwrap_err();

        assert!(matches!(err, Error::BackendTimeout(_)));
        assert!(err.is_transient());
    }
}
