//! Job worker: polls the queue, claims jobs, and runs handlers.
//!
//! The worker claims up to `max_concurrent_jobs` at a time and processes
//! them concurrently, sleeping only when the queue is empty. Every handler
//! execution is bounded by the job timeout; a timed-out job takes the
//! transient-failure path (it may succeed on retry).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use revio_core::{defaults, Job, JobRepository, JobStatus, JobType, Result};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent jobs.
    pub max_concurrent_jobs: usize,
    /// Per-job execution timeout in seconds.
    pub job_timeout_secs: u64,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::JOB_POLL_INTERVAL_MS,
            max_concurrent_jobs: defaults::JOB_MAX_CONCURRENT,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_MAX_CONCURRENT` | `4` | Max concurrent jobs |
    /// | `JOB_POLL_INTERVAL_MS` | `500` | Polling interval when queue is empty |
    /// | `JOB_TIMEOUT_SECS` | `120` | Per-job execution timeout |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::JOB_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_POLL_INTERVAL_MS);

        let job_timeout_secs = std::env::var("JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_TIMEOUT_SECS);

        Self {
            poll_interval_ms,
            max_concurrent_jobs,
            job_timeout_secs,
            enabled,
        }
    }

    /// Create a new config with custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Set the per-job execution timeout.
    pub fn with_job_timeout(mut self, secs: u64) -> Self {
        self.job_timeout_secs = secs;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A job was claimed and started.
    JobStarted { job_id: Uuid, job_type: JobType },
    /// A job completed successfully.
    JobCompleted { job_id: Uuid, job_type: JobType },
    /// A job failed transiently and was requeued for retry.
    JobRetried {
        job_id: Uuid,
        job_type: JobType,
        error: String,
    },
    /// A job failed terminally.
    JobFailed {
        job_id: Uuid,
        job_type: JobType,
        error: String,
    },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| revio_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Job worker that processes jobs from the queue.
pub struct JobWorker {
    repo: Arc<dyn JobRepository>,
    config: WorkerConfig,
    handlers: Arc<RwLock<HashMap<JobType, Arc<dyn JobHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    /// Create a new job worker.
    pub fn new(repo: Arc<dyn JobRepository>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            repo,
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        }
    }

    /// Register a handler for a job type.
    pub async fn register_handler<H: JobHandler + 'static>(&self, handler: H) {
        let job_type = handler.job_type();
        let mut handlers = self.handlers.write().await;
        handlers.insert(job_type, Arc::new(handler));
        debug!(?job_type, "Registered job handler");
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the worker loop with concurrent job processing.
    ///
    /// Claims up to `max_concurrent_jobs` at a time and processes them
    /// concurrently. Only sleeps when the queue is empty.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent_jobs,
            job_timeout_secs = self.config.job_timeout_secs,
            "Job worker started"
        );

        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let max_concurrent = self.config.max_concurrent_jobs;

        loop {
            // Check for shutdown before claiming jobs
            if shutdown_rx.try_recv().is_ok() {
                info!("Job worker received shutdown signal");
                break;
            }

            // Claim up to max_concurrent jobs
            let mut claimed = 0;
            let mut tasks = tokio::task::JoinSet::new();

            for _ in 0..max_concurrent {
                match self.claim_job().await {
                    Some(job) => {
                        claimed += 1;
                        let worker = self.clone_refs();
                        tasks.spawn(async move {
                            worker.execute_job(job).await;
                        });
                    }
                    None => break,
                }
            }

            if claimed == 0 {
                // Queue empty, sleep before polling again
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Job worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(claimed, "Processing concurrent job batch");
                // Wait for all claimed jobs to complete
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Job task panicked");
                    }
                }
                // No sleep, immediately try to claim more jobs
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Job worker stopped");
    }

    /// Claim the next available job without processing it.
    async fn claim_job(&self) -> Option<Job> {
        match self.repo.claim_next().await {
            Ok(Some(job)) => Some(job),
            Ok(None) => None,
            Err(e) => {
                error!(error = ?e, "Failed to claim job");
                None
            }
        }
    }

    /// Clone references needed for spawned job tasks.
    fn clone_refs(&self) -> JobWorkerRef {
        JobWorkerRef {
            repo: self.repo.clone(),
            handlers: self.handlers.clone(),
            event_tx: self.event_tx.clone(),
            job_timeout: Duration::from_secs(self.config.job_timeout_secs),
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Get the pending job count.
    pub async fn pending_count(&self) -> Result<i64> {
        self.repo.pending_count().await
    }
}

/// Lightweight reference bundle for executing a single job in a spawned task.
struct JobWorkerRef {
    repo: Arc<dyn JobRepository>,
    handlers: Arc<RwLock<HashMap<JobType, Arc<dyn JobHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
    job_timeout: Duration,
}

impl JobWorkerRef {
    /// Execute a single claimed job.
    async fn execute_job(self, job: Job) {
        let start = Instant::now();
        let job_id = job.id;
        let job_type = job.job_type;
        let attempt = job.attempt_count;

        info!(?job_id, ?job_type, attempt, "Processing job");

        let _ = self
            .event_tx
            .send(WorkerEvent::JobStarted { job_id, job_type });

        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&job_type).cloned()
        };

        let result = match handler {
            Some(handler) => {
                let ctx = JobContext::new(job);
                match tokio::time::timeout(self.job_timeout, handler.execute(ctx)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(
                            ?job_id,
                            ?job_type,
                            "Job exceeded timeout of {}s",
                            self.job_timeout.as_secs()
                        );
                        // Timed-out jobs may succeed on retry.
                        JobResult::Retry(format!(
                            "Job exceeded timeout of {}s",
                            self.job_timeout.as_secs()
                        ))
                    }
                }
            }
            None => {
                warn!(?job_type, "No handler registered for job type");
                JobResult::Failed(format!("No handler for job type: {:?}", job_type))
            }
        };

        match result {
            JobResult::Success(result_data) => {
                if let Err(e) = self.repo.complete(job_id, result_data).await {
                    error!(error = ?e, ?job_id, "Failed to mark job as completed");
                } else {
                    info!(
                        ?job_id,
                        ?job_type,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job completed successfully"
                    );
                    let _ = self
                        .event_tx
                        .send(WorkerEvent::JobCompleted { job_id, job_type });
                }
            }
            JobResult::Retry(error) => match self.repo.fail_transient(job_id, &error).await {
                Ok(JobStatus::Pending) => {
                    warn!(?job_id, ?job_type, %error, attempt, "Job requeued for retry");
                    let _ = self.event_tx.send(WorkerEvent::JobRetried {
                        job_id,
                        job_type,
                        error,
                    });
                }
                Ok(_) => {
                    warn!(?job_id, ?job_type, %error, "Job failed after exhausting retries");
                    let _ = self.event_tx.send(WorkerEvent::JobFailed {
                        job_id,
                        job_type,
                        error,
                    });
                }
                Err(e) => {
                    error!(error = ?e, ?job_id, "Failed to record transient failure");
                }
            },
            JobResult::Failed(error) => {
                if let Err(e) = self.repo.fail_permanent(job_id, &error).await {
                    error!(error = ?e, ?job_id, "Failed to mark job as failed");
                } else {
                    warn!(
                        ?job_id,
                        ?job_type,
                        %error,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job failed permanently"
                    );
                    let _ = self.event_tx.send(WorkerEvent::JobFailed {
                        job_id,
                        job_type,
                        error,
                    });
                }
            }
        }
    }
}

/// Builder for creating a job worker with handlers.
pub struct WorkerBuilder {
    repo: Arc<dyn JobRepository>,
    config: WorkerConfig,
    handlers: Vec<Box<dyn JobHandler>>,
}

impl WorkerBuilder {
    pub fn new(repo: Arc<dyn JobRepository>) -> Self {
        Self {
            repo,
            config: WorkerConfig::default(),
            handlers: Vec::new(),
        }
    }

    /// Set the worker configuration.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a handler.
    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Build the worker and register all handlers.
    pub async fn build(self) -> JobWorker {
        let worker = JobWorker::new(self.repo, self.config);
        {
            let mut handlers = worker.handlers.write().await;
            for handler in self.handlers {
                let job_type = handler.job_type();
                handlers.insert(job_type, Arc::from(handler));
            }
        }
        worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval_ms, defaults::JOB_POLL_INTERVAL_MS);
        assert_eq!(config.max_concurrent_jobs, defaults::JOB_MAX_CONCURRENT);
        assert_eq!(config.job_timeout_secs, defaults::JOB_TIMEOUT_SECS);
        assert!(config.enabled);
    }

    #[test]
    fn config_builder_chain() {
        let config = WorkerConfig::default()
            .with_poll_interval(50)
            .with_max_concurrent(2)
            .with_job_timeout(10)
            .with_enabled(false);
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.job_timeout_secs, 10);
        assert!(!config.enabled);
    }
}
