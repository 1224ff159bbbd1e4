//! Job handlers for each job type.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use revio_core::{Job, JobType};

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
}

impl JobContext {
    pub fn new(job: Job) -> Self {
        Self { job }
    }

    /// Get the material ID for this job.
    pub fn material_id(&self) -> Uuid {
        self.job.material_id
    }

    /// Get the job payload.
    pub fn payload(&self) -> Option<&JsonValue> {
        self.job.payload.as_ref()
    }
}

/// Result of job execution.
///
/// The worker routes `Failed` to the permanent-failure path (no retry) and
/// `Retry` to the transient path (requeue with backoff while the attempt
/// budget lasts). Handlers pick the variant from the error's retryability.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with its result data.
    Success(JsonValue),
    /// Job failed permanently; never retried.
    Failed(String),
    /// Job failed transiently; retried after a backoff delay.
    Retry(String),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job type this handler processes.
    fn job_type(&self) -> JobType;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;

    /// Check if this handler can process the given job type.
    fn can_handle(&self, job_type: JobType) -> bool {
        self.job_type() == job_type
    }
}

/// No-op handler for testing.
pub struct NoOpHandler {
    job_type: JobType,
}

impl NoOpHandler {
    pub fn new(job_type: JobType) -> Self {
        Self { job_type }
    }
}

#[async_trait]
impl JobHandler for NoOpHandler {
    fn job_type(&self) -> JobType {
        self.job_type
    }

    async fn execute(&self, _ctx: JobContext) -> JobResult {
        JobResult::Success(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use revio_core::JobStatus;

    fn job(payload: Option<JsonValue>) -> Job {
        let now = Utc::now();
        Job {
            id: Uuid::new_v4(),
            material_id: Uuid::new_v4(),
            job_type: JobType::Reviewer,
            status: JobStatus::Pending,
            priority: 0,
            payload,
            result: None,
            error_message: None,
            attempt_count: 0,
            max_attempts: 3,
            created_at: now,
            started_at: None,
            completed_at: None,
            available_at: now,
        }
    }

    #[test]
    fn context_exposes_material_and_payload() {
        let j = job(Some(serde_json::json!({"priority_hint": "high"})));
        let material_id = j.material_id;
        let ctx = JobContext::new(j);
        assert_eq!(ctx.material_id(), material_id);
        assert_eq!(ctx.payload().unwrap()["priority_hint"], "high");
    }

    #[tokio::test]
    async fn noop_handler_succeeds() {
        let handler = NoOpHandler::new(JobType::Reviewer);
        assert!(handler.can_handle(JobType::Reviewer));
        let result = handler.execute(JobContext::new(job(None))).await;
        assert!(matches!(result, JobResult::Success(_)));
    }
}
