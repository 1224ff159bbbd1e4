//! Mock inference backend for deterministic testing.
//!
//! Embeddings are a pure function of the input text (bag-of-token hashing),
//! so texts sharing vocabulary land close together and repeated runs are
//! identical. Failure injection covers the error paths the pipeline and job
//! layer must handle.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use revio_core::{
    EmbeddingBackend, Error, InferenceBackend, Result, SummarizationBackend,
};

/// Mock inference backend for testing.
#[derive(Clone)]
pub struct MockInferenceBackend {
    dimension: usize,
    latency: Duration,
    fail_embeds: bool,
    fail_summaries_with_timeout: bool,
    fixed_summary: Option<String>,
    embed_calls: Arc<AtomicUsize>,
    summarize_calls: Arc<AtomicUsize>,
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInferenceBackend {
    pub fn new() -> Self {
        Self {
            dimension: 64,
            latency: Duration::ZERO,
            fail_embeds: false,
            fail_summaries_with_timeout: false,
            fixed_summary: None,
            embed_calls: Arc::new(AtomicUsize::new(0)),
            summarize_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every embed call fail with a transient backend error.
    pub fn with_embed_failure(mut self) -> Self {
        self.fail_embeds = true;
        self
    }

    /// Make every summarize call fail with a backend timeout.
    pub fn with_summarize_timeout(mut self) -> Self {
        self.fail_summaries_with_timeout = true;
        self
    }

    /// Return a fixed summary instead of the truncation default.
    pub fn with_fixed_summary(mut self, summary: impl Into<String>) -> Self {
        self.fixed_summary = Some(summary.into());
        self
    }

    /// Number of embed calls made so far.
    pub fn embed_call_count(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Number of summarize calls made so far.
    pub fn summarize_call_count(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_embeds {
            return Err(Error::Backend("mock embed failure".to_string()));
        }

        // Bag-of-token hashing: each token bumps one axis, so overlapping
        // vocabulary produces similar vectors.
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dimension;
            vector[idx] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl SummarizationBackend for MockInferenceBackend {
    async fn summarize(&self, text: &str, max_words: usize) -> Result<String> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_summaries_with_timeout {
            return Err(Error::BackendTimeout("mock summarize timeout".to_string()));
        }

        if let Some(fixed) = &self.fixed_summary {
            return Ok(fixed.clone());
        }

        let words: Vec<&str> = text.split_whitespace().take(max_words).collect();
        Ok(words.join(" "))
    }

    fn model_name(&self) -> &str {
        "mock-summarize"
    }
}

#[async_trait]
impl InferenceBackend for MockInferenceBackend {
    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail_embeds && !self.fail_summaries_with_timeout)
    }
}
