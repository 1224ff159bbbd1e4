//! PostgreSQL job repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use revio_core::{
    Error, Job, JobRepository, JobStatus, JobType, QueueStats, Result, RetryPolicy,
};

/// PostgreSQL implementation of [`JobRepository`].
///
/// The claim uses `FOR UPDATE SKIP LOCKED`, so any number of workers can
/// poll the same queue: exactly one claims each pending row.
pub struct PgJobRepository {
    pool: Pool<Postgres>,
    policy: RetryPolicy,
}

impl PgJobRepository {
    /// Create a repository with the given connection pool and the default
    /// retry policy.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            policy: RetryPolicy::default(),
        }
    }

    /// Create a repository with an explicit retry policy.
    pub fn with_policy(pool: Pool<Postgres>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    const JOB_COLUMNS: &'static str =
        "id, material_id, job_type, status, priority, payload, result, error_message, \
         attempt_count, max_attempts, created_at, started_at, completed_at, available_at";

    /// Parse a job row into a Job struct. Unknown enum strings fall back to
    /// benign values rather than failing the read.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> Job {
        let job_type: String = row.get("job_type");
        let status: String = row.get("status");
        Job {
            id: row.get("id"),
            material_id: row.get("material_id"),
            job_type: JobType::parse(&job_type).unwrap_or(JobType::Reviewer),
            status: JobStatus::parse(&status).unwrap_or(JobStatus::Pending),
            priority: row.get("priority"),
            payload: row.get("payload"),
            result: row.get("result"),
            error_message: row.get("error_message"),
            attempt_count: row.get("attempt_count"),
            max_attempts: row.get("max_attempts"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            available_at: row.get("available_at"),
        }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn enqueue(
        &self,
        material_id: Uuid,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid> {
        let job_id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO job_queue
                 (id, material_id, job_type, status, priority, payload,
                  attempt_count, max_attempts, created_at, available_at)
             VALUES ($1, $2, $3, 'pending', $4, $5, 0, $6, $7, $7)",
        )
        .bind(job_id)
        .bind(material_id)
        .bind(job_type.as_str())
        .bind(priority)
        .bind(&payload)
        .bind(self.policy.max_attempts)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(job_id)
    }

    async fn claim_next(&self) -> Result<Option<Job>> {
        let now = Utc::now();

        // FOR UPDATE SKIP LOCKED makes the pending->processing transition a
        // compare-and-swap under concurrent workers.
        let row = sqlx::query(&format!(
            "UPDATE job_queue
             SET status = 'processing', started_at = $1
             WHERE id = (
                 SELECT id FROM job_queue
                 WHERE status = 'pending' AND available_at <= $1
                 ORDER BY priority DESC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {}",
            Self::JOB_COLUMNS
        ))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn complete(&self, job_id: Uuid, result: JsonValue) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue
             SET status = 'completed', completed_at = $1, result = $2,
                 error_message = NULL
             WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(&result)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail_transient(&self, job_id: Uuid, error: &str) -> Result<JobStatus> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let (attempt_count, max_attempts): (i32, i32) =
            sqlx::query_as("SELECT attempt_count, max_attempts FROM job_queue WHERE id = $1")
                .bind(job_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::Database)?;

        let attempts = attempt_count + 1;
        let status = if attempts < max_attempts {
            // Attempt budget remains: back to pending after a backoff delay.
            // error_message is set iff failed, so the requeued row is clean;
            // the worker logs the transient error when it emits the retry.
            let delay = self.policy.delay_for(attempts);
            let available_at = now + chrono::Duration::from_std(delay).unwrap_or_default();
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'pending', error_message = NULL, started_at = NULL,
                     attempt_count = $1, available_at = $2
                 WHERE id = $3",
            )
            .bind(attempts)
            .bind(available_at)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            JobStatus::Pending
        } else {
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'failed', completed_at = $1, error_message = $2,
                     attempt_count = $3
                 WHERE id = $4",
            )
            .bind(now)
            .bind(error)
            .bind(attempts)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            JobStatus::Failed
        };

        tx.commit().await.map_err(Error::Database)?;
        Ok(status)
    }

    async fn fail_permanent(&self, job_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue
             SET status = 'failed', completed_at = $1, error_message = $2
             WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM job_queue WHERE id = $1",
            Self::JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM job_queue WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM job_queue ORDER BY created_at DESC LIMIT $1",
            Self::JOB_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_job_row).collect())
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'processing') as processing,
                COUNT(*) FILTER (WHERE status = 'completed') as completed,
                COUNT(*) FILTER (WHERE status = 'failed') as failed,
                COUNT(*) as total
             FROM job_queue",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            pending: row.get::<i64, _>("pending"),
            processing: row.get::<i64, _>("processing"),
            completed: row.get::<i64, _>("completed"),
            failed: row.get::<i64, _>("failed"),
            total: row.get::<i64, _>("total"),
        })
    }
}
