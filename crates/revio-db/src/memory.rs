//! In-memory job repository.
//!
//! Mirrors the PostgreSQL repository's state machine exactly, with a mutex
//! standing in for row locks: the pending->processing transition is a
//! conditional swap performed under the lock, so concurrent claimers can
//! never take the same job twice.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use revio_core::{
    Error, Job, JobRepository, JobStatus, JobType, QueueStats, Result, RetryPolicy,
};

/// In-process implementation of [`JobRepository`].
#[derive(Default)]
pub struct MemoryJobRepository {
    rows: Mutex<HashMap<Uuid, Job>>,
    policy: RetryPolicy,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::with_policy(RetryPolicy::default())
    }

    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            policy,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Job>>> {
        self.rows
            .lock()
            .map_err(|_| Error::Persistence("job store lock poisoned".to_string()))
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn enqueue(
        &self,
        material_id: Uuid,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid> {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            material_id,
            job_type,
            status: JobStatus::Pending,
            priority,
            payload,
            result: None,
            error_message: None,
            attempt_count: 0,
            max_attempts: self.policy.max_attempts,
            created_at: now,
            started_at: None,
            completed_at: None,
            available_at: now,
        };
        let id = job.id;
        self.lock()?.insert(id, job);
        Ok(id)
    }

    async fn claim_next(&self) -> Result<Option<Job>> {
        let now = Utc::now();
        let mut rows = self.lock()?;

        // Pick the eligible pending job with highest priority, oldest first.
        let next_id = rows
            .values()
            .filter(|j| j.status == JobStatus::Pending && j.available_at <= now)
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
            })
            .map(|j| j.id);

        let Some(id) = next_id else {
            return Ok(None);
        };

        // Conditional swap under the lock; the filter above saw Pending, and
        // no other claimer can have intervened while we hold the mutex.
        let job = rows.get_mut(&id).expect("row present under lock");
        job.status = JobStatus::Processing;
        job.started_at = Some(now);
        Ok(Some(job.clone()))
    }

    async fn complete(&self, job_id: Uuid, result: JsonValue) -> Result<()> {
        let mut rows = self.lock()?;
        let job = rows
            .get_mut(&job_id)
            .ok_or_else(|| Error::Persistence(format!("unknown job {job_id}")))?;
        job.status = JobStatus::Completed;
        job.completed_at = Some(Utc::now());
        job.result = Some(result);
        job.error_message = None;
        Ok(())
    }

    async fn fail_transient(&self, job_id: Uuid, error: &str) -> Result<JobStatus> {
        let now = Utc::now();
        let mut rows = self.lock()?;
        let job = rows
            .get_mut(&job_id)
            .ok_or_else(|| Error::Persistence(format!("unknown job {job_id}")))?;

        job.attempt_count += 1;
        if job.attempt_count < job.max_attempts {
            // error_message is set iff failed; a requeued job is clean again.
            let delay = self.policy.delay_for(job.attempt_count);
            job.status = JobStatus::Pending;
            job.error_message = None;
            job.started_at = None;
            job.available_at = now + chrono::Duration::from_std(delay).unwrap_or_default();
            Ok(JobStatus::Pending)
        } else {
            job.status = JobStatus::Failed;
            job.error_message = Some(error.to_string());
            job.completed_at = Some(now);
            Ok(JobStatus::Failed)
        }
    }

    async fn fail_permanent(&self, job_id: Uuid, error: &str) -> Result<()> {
        let mut rows = self.lock()?;
        let job = rows
            .get_mut(&job_id)
            .ok_or_else(|| Error::Persistence(format!("unknown job {job_id}")))?;
        job.status = JobStatus::Failed;
        job.completed_at = Some(Utc::now());
        job.error_message = Some(error.to_string());
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.lock()?.get(&job_id).cloned())
    }

    async fn pending_count(&self) -> Result<i64> {
        Ok(self
            .lock()?
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .count() as i64)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>> {
        let rows = self.lock()?;
        let mut jobs: Vec<Job> = rows.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let rows = self.lock()?;
        let mut stats = QueueStats {
            pending: 0,
            processing: 0,
            completed: 0,
            failed: 0,
            total: rows.len() as i64,
        };
        for job in rows.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn zero_backoff_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: vec![Duration::ZERO],
        }
    }

    #[tokio::test]
    async fn enqueue_starts_pending_with_zero_attempts() {
        let repo = MemoryJobRepository::new();
        let id = repo
            .enqueue(Uuid::new_v4(), JobType::Reviewer, 0, None)
            .await
            .unwrap();

        let job = repo.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempt_count, 0);
        assert!(job.result.is_none());
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn claim_transitions_to_processing() {
        let repo = MemoryJobRepository::new();
        let id = repo
            .enqueue(Uuid::new_v4(), JobType::Reviewer, 0, None)
            .await
            .unwrap();

        let claimed = repo.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.status, JobStatus::Processing);
        // Attempts count failures, not claims.
        assert_eq!(claimed.attempt_count, 0);
        assert!(claimed.started_at.is_some());

        // Nothing else is claimable.
        assert!(repo.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_claimers_claim_exactly_once() {
        let repo = Arc::new(MemoryJobRepository::new());
        repo.enqueue(Uuid::new_v4(), JobType::Reviewer, 0, None)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move { repo.claim_next().await }));
        }

        let mut claims = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                claims += 1;
            }
        }
        assert_eq!(claims, 1);
    }

    #[tokio::test]
    async fn claim_order_priority_then_age() {
        let repo = MemoryJobRepository::new();
        let low = repo
            .enqueue(Uuid::new_v4(), JobType::Reviewer, 0, None)
            .await
            .unwrap();
        let high = repo
            .enqueue(Uuid::new_v4(), JobType::Reviewer, 5, None)
            .await
            .unwrap();

        assert_eq!(repo.claim_next().await.unwrap().unwrap().id, high);
        assert_eq!(repo.claim_next().await.unwrap().unwrap().id, low);
    }

    #[tokio::test]
    async fn complete_is_terminal_with_result() {
        let repo = MemoryJobRepository::new();
        let id = repo
            .enqueue(Uuid::new_v4(), JobType::Reviewer, 0, None)
            .await
            .unwrap();
        repo.claim_next().await.unwrap().unwrap();
        repo.complete(id, serde_json::json!({"ok": true})).await.unwrap();

        let job = repo.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.status.is_terminal());
        assert!(job.completed_at.is_some());
        assert_eq!(job.result.unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn transient_failure_retries_until_budget_exhausted() {
        let repo = MemoryJobRepository::with_policy(zero_backoff_policy());
        let id = repo
            .enqueue(Uuid::new_v4(), JobType::Reviewer, 0, None)
            .await
            .unwrap();

        // Failures 1 and 2 go back to pending; failure 3 exhausts the budget.
        for attempt in 1..=3 {
            let job = repo.claim_next().await.unwrap().unwrap();
            assert_eq!(job.attempt_count, attempt - 1);
            let status = repo.fail_transient(id, "backend timeout").await.unwrap();
            if attempt < 3 {
                assert_eq!(status, JobStatus::Pending);
            } else {
                assert_eq!(status, JobStatus::Failed);
            }
        }

        let job = repo.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempt_count, 3);
        assert_eq!(job.error_message.as_deref(), Some("backend timeout"));
        assert!(repo.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transient_failure_sets_backoff_delay() {
        let repo = MemoryJobRepository::with_policy(RetryPolicy {
            max_attempts: 3,
            backoff: vec![Duration::from_secs(60)],
        });
        let id = repo
            .enqueue(Uuid::new_v4(), JobType::Reviewer, 0, None)
            .await
            .unwrap();

        repo.claim_next().await.unwrap().unwrap();
        let status = repo.fail_transient(id, "flaky").await.unwrap();
        assert_eq!(status, JobStatus::Pending);

        // Pending but not yet eligible: available_at is in the future.
        let job = repo.get(id).await.unwrap().unwrap();
        assert!(job.available_at > Utc::now());
        assert!(repo.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retried_job_carries_no_error_message_until_terminal() {
        let repo = MemoryJobRepository::with_policy(zero_backoff_policy());
        let id = repo
            .enqueue(Uuid::new_v4(), JobType::Reviewer, 0, None)
            .await
            .unwrap();

        repo.claim_next().await.unwrap().unwrap();
        let status = repo.fail_transient(id, "backend timeout").await.unwrap();
        assert_eq!(status, JobStatus::Pending);

        // error_message is set iff failed; the requeued job is clean.
        let job = repo.get(id).await.unwrap().unwrap();
        assert!(job.error_message.is_none());

        // A retry that succeeds ends completed, with no stale error.
        repo.claim_next().await.unwrap().unwrap();
        repo.complete(id, serde_json::json!({"ok": true})).await.unwrap();
        let job = repo.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error_message.is_none());
        assert!(job.result.is_some());
    }

    #[tokio::test]
    async fn permanent_failure_fails_without_retry() {
        let repo = MemoryJobRepository::new();
        let id = repo
            .enqueue(Uuid::new_v4(), JobType::Reviewer, 0, None)
            .await
            .unwrap();
        repo.claim_next().await.unwrap().unwrap();
        repo.fail_permanent(id, "extraction_failure: no usable text")
            .await
            .unwrap();

        let job = repo.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        // Permanent failures never touch the attempt budget.
        assert_eq!(job.attempt_count, 0);
        assert!(job.error_message.unwrap().contains("extraction_failure"));
        assert!(repo.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn queue_stats_track_every_state() {
        let repo = MemoryJobRepository::with_policy(zero_backoff_policy());
        let material = Uuid::new_v4();

        let done = repo.enqueue(material, JobType::Reviewer, 0, None).await.unwrap();
        repo.claim_next().await.unwrap();
        repo.complete(done, serde_json::json!({})).await.unwrap();

        let dead = repo.enqueue(material, JobType::Reviewer, 0, None).await.unwrap();
        repo.claim_next().await.unwrap();
        repo.fail_permanent(dead, "bad input").await.unwrap();

        repo.enqueue(material, JobType::Reviewer, 0, None).await.unwrap();
        repo.claim_next().await.unwrap();

        repo.enqueue(material, JobType::Reviewer, 0, None).await.unwrap();

        let stats = repo.queue_stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total, 4);
        assert_eq!(repo.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_recent_returns_newest_first() {
        let repo = MemoryJobRepository::new();
        for _ in 0..3 {
            repo.enqueue(Uuid::new_v4(), JobType::Reviewer, 0, None)
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        let jobs = repo.list_recent(2).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs[0].created_at >= jobs[1].created_at);
    }
}
