//! Centralized default constants for the revio system.
//!
//! **This module is the single source of truth** for all shared default
//! values. All crates reference these constants instead of defining their
//! own magic numbers.

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Default maximum attempt count for jobs (initial attempt + retries).
pub const JOB_MAX_ATTEMPTS: i32 = 3;

/// Default retry backoff schedule in seconds, indexed by attempt number.
/// A job that fails transiently on attempt N becomes eligible again after
/// `JOB_BACKOFF_SECS[N - 1]` seconds (the last entry repeats).
pub const JOB_BACKOFF_SECS: [u64; 3] = [5, 15, 45];

/// Default job worker poll interval in milliseconds (queue-empty sleep).
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Default maximum concurrent jobs per worker.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Default job execution timeout in seconds.
pub const JOB_TIMEOUT_SECS: u64 = 120;

/// Default job priority (higher claims first).
pub const JOB_PRIORITY: i32 = 0;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Default summarization model name (Ollama).
pub const SUMMARIZE_MODEL: &str = "qwen3:8b";

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Timeout for summarization requests in seconds.
pub const SUMMARIZE_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// PIPELINE
// =============================================================================

/// Pipeline version recorded in generation metadata.
pub const PIPELINE_VERSION: &str = "2.1";

/// Source spans longer than this are abstractively summarized before
/// concept detection (when a generation backend is configured).
pub const SUMMARIZE_THRESHOLD_CHARS: usize = 6_000;

/// Word target handed to the summarization backend for long spans.
pub const SUMMARIZE_MAX_WORDS: usize = 400;

/// Default character budget for `compress_definition`.
pub const COMPRESS_MAX_CHARS: usize = 300;

/// Word ceiling for a concept's short definition.
pub const SHORT_DEFINITION_MAX_WORDS: usize = 28;

/// Word ceiling for a concept's full definition.
pub const FULL_DEFINITION_MAX_WORDS: usize = 70;

/// Maximum examples kept per concept.
pub const MAX_EXAMPLES: usize = 3;

/// Token-overlap ratio above which two sentences are near-duplicates.
pub const DUPLICATE_OVERLAP_THRESHOLD: f32 = 0.8;

// =============================================================================
// CLUSTERING
// =============================================================================

/// Minimum number of topics produced by the clusterer.
pub const CLUSTER_MIN_TOPICS: usize = 2;

/// Maximum number of topics produced by the clusterer.
pub const CLUSTER_MAX_TOPICS: usize = 9;

/// Cosine similarity threshold for merging clusters.
pub const CLUSTER_SIMILARITY_THRESHOLD: f32 = 0.55;

// =============================================================================
// QUALITY
// =============================================================================

/// Weight of the accuracy sub-score in the overall quality score.
pub const QUALITY_WEIGHT_ACCURACY: f32 = 0.30;

/// Weight of the clarity sub-score in the overall quality score.
pub const QUALITY_WEIGHT_CLARITY: f32 = 0.25;

/// Weight of the separation sub-score in the overall quality score.
pub const QUALITY_WEIGHT_SEPARATION: f32 = 0.25;

/// Weight of the structure sub-score in the overall quality score.
pub const QUALITY_WEIGHT_STRUCTURE: f32 = 0.20;

/// Acceptance threshold on the overall quality score.
pub const QUALITY_ACCEPT_OVERALL: f32 = 7.0;

/// Acceptance threshold on each quality sub-score.
pub const QUALITY_ACCEPT_SUBSCORE: f32 = 6.0;

// =============================================================================
// MATERIALS
// =============================================================================

/// Lifetime of a short-lived signed material URL in seconds (1 hour).
///
/// When the extraction stage runs outside the worker's trust boundary, the
/// worker exchanges its privileged credential for a URL with this TTL; the
/// long-lived credential itself never leaves the worker.
pub const SIGNED_URL_TTL_SECS: u64 = 3600;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_weights_sum_to_one() {
        let sum = QUALITY_WEIGHT_ACCURACY
            + QUALITY_WEIGHT_CLARITY
            + QUALITY_WEIGHT_SEPARATION
            + QUALITY_WEIGHT_STRUCTURE;
        assert!((sum - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn backoff_schedule_is_increasing() {
        for w in JOB_BACKOFF_SECS.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn cluster_topic_bounds_ordered() {
        const {
            assert!(CLUSTER_MIN_TOPICS >= 2);
            assert!(CLUSTER_MIN_TOPICS < CLUSTER_MAX_TOPICS);
        }
    }

    #[test]
    fn acceptance_thresholds_within_scale() {
        assert!(QUALITY_ACCEPT_SUBSCORE < QUALITY_ACCEPT_OVERALL);
        assert!(QUALITY_ACCEPT_OVERALL <= 10.0);
    }
}
