//! Core traits for revio abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// JOB REPOSITORY
// =============================================================================

/// Durable row-store for jobs with a single atomic claim operation.
///
/// The claim is the system's sole concurrency-safety mechanism: under N
/// concurrent workers racing on the same pending job, exactly one claim
/// succeeds. Implementations must make the pending→processing transition a
/// compare-and-swap that only succeeds while the row is still pending.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job in `pending` state, returning its id.
    async fn enqueue(
        &self,
        material_id: Uuid,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid>;

    /// Atomically claim the next eligible pending job, transitioning it to
    /// `processing`. Eligibility: status pending, `available_at` elapsed;
    /// ordering: priority descending, then created_at ascending.
    async fn claim_next(&self) -> Result<Option<Job>>;

    /// Mark a job completed with its result payload.
    async fn complete(&self, job_id: Uuid, result: JsonValue) -> Result<()>;

    /// Record a transient failure, incrementing the attempt count. If the
    /// attempt budget is not exhausted, the job returns to `pending` with a
    /// backoff delay and no error message (`error_message` is set iff
    /// failed); otherwise it is marked `failed` carrying the final error.
    /// Returns the resulting status.
    async fn fail_transient(&self, job_id: Uuid, error: &str) -> Result<JobStatus>;

    /// Record a permanent failure: the job is marked `failed` immediately,
    /// with no retry.
    async fn fail_permanent(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Get a job by id.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// Count of pending jobs.
    async fn pending_count(&self) -> Result<i64>;

    /// Most recently created jobs, newest first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>>;

    /// Aggregate queue statistics.
    async fn queue_stats(&self) -> Result<QueueStats>;
}

// =============================================================================
// INFERENCE BACKENDS
// =============================================================================

/// Backend for generating embedding vectors.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for abstractive summarization.
#[async_trait]
pub trait SummarizationBackend: Send + Sync {
    /// Abstractively compress `text` to roughly `max_words` words.
    ///
    /// May return empty or garbled output; callers must treat failures as
    /// retryable and bound every call with a timeout.
    async fn summarize(&self, text: &str, max_words: usize) -> Result<String>;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Combined backend supporting both embedding and summarization.
#[async_trait]
pub trait InferenceBackend: EmbeddingBackend + SummarizationBackend {
    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// MATERIAL COLLABORATORS
// =============================================================================

/// Read-only access to stored source materials.
///
/// Out-of-scope collaborator consumed via this narrow interface. The store
/// runs with the worker's privileged credential; if extraction happens in a
/// separate trust boundary, `fetch` returns a short-lived signed URL instead
/// of raw bytes.
#[async_trait]
pub trait MaterialStore: Send + Sync {
    /// Resolve a material id to its content.
    ///
    /// Returns `Error::MaterialNotFound` if the id does not exist.
    async fn fetch(&self, material_id: Uuid) -> Result<MaterialContent>;
}

/// Raw text extraction from material content.
///
/// Out-of-scope collaborator; may fail permanently (`ExtractionFailure`)
/// when the bytes contain no usable text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract plain text from the given content.
    async fn extract(&self, content: MaterialContent) -> Result<String>;
}
