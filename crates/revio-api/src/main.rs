//! revio-api - HTTP API server for revio
//!
//! Exposes the asynchronous reviewer generation flow: enqueue a job for a
//! material, poll its status, and read queue statistics. Generation itself
//! runs in the embedded job worker.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use revio_core::{defaults, InferenceBackend, Job, JobRepository, JobStatus, JobType, RetryPolicy};
use revio_db::PgJobRepository;
use revio_inference::OllamaBackend;
use revio_jobs::{
    FsMaterialStore, PlainTextExtractor, ReviewerJobHandler, WorkerBuilder, WorkerConfig,
};
use revio_pipeline::{OrchestratorOptions, ReviewerOrchestrator};

// =============================================================================
// STATE
// =============================================================================

#[derive(Clone)]
struct AppState {
    repo: Arc<dyn JobRepository>,
    backend: Arc<dyn InferenceBackend>,
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT - "json" or "text" (default: "text")
    //   RUST_LOG   - standard env filter (default: "revio_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "revio_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/revio".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);

    // Connect to database and run migrations
    info!("Connecting to database...");
    let pool = revio_db::create_pool(&database_url).await?;
    revio_db::run_migrations(&pool).await?;

    let repo: Arc<dyn JobRepository> =
        Arc::new(PgJobRepository::with_policy(pool, RetryPolicy::from_env()));

    // Inference backend
    let backend = Arc::new(OllamaBackend::from_env());
    match backend.health_check().await {
        Ok(true) => info!("Inference backend is available"),
        _ => warn!("Inference backend is not responding, jobs will retry until it is"),
    }

    // Start the job worker with the reviewer handler
    let worker_config = WorkerConfig::from_env();
    let orchestrator = ReviewerOrchestrator::with_options(
        backend.clone(),
        OrchestratorOptions::from_env(),
    );
    let handler = ReviewerJobHandler::new(
        Arc::new(FsMaterialStore::from_env()),
        Arc::new(PlainTextExtractor),
        Arc::new(orchestrator),
    );
    let worker = WorkerBuilder::new(repo.clone())
        .with_config(worker_config)
        .with_handler(handler)
        .build()
        .await;
    let worker_handle = worker.start();
    info!("Job worker started");

    let state = AppState {
        repo,
        backend: backend as Arc<dyn InferenceBackend>,
    };
    let app = router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    worker_handle.shutdown().await.ok();
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/materials/:id/reviewer", post(enqueue_reviewer))
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/stats", get(queue_stats))
        .route("/api/jobs/:id", get(get_job))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// ERRORS
// =============================================================================

enum ApiError {
    Internal(revio_core::Error),
    NotFound(String),
    BadRequest(String),
}

impl From<revio_core::Error> for ApiError {
    fn from(err: revio_core::Error) -> Self {
        match &err {
            revio_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            // Internal errors surface only their stable code and summary,
            // never backtraces or connection strings.
            ApiError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.code(),
                err.to_string(),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg),
        };

        let body = Json(serde_json::json!({
            "error": { "code": code, "message": message },
        }));
        (status, body).into_response()
    }
}

/// Map a persisted failure message back to its stable error code.
///
/// Failed jobs store the error's display form; the API exposes only the
/// code plus the short summary.
fn error_code_for(message: &str) -> &'static str {
    let prefix = message.split(':').next().unwrap_or("");
    match prefix {
        "Database error" => "database_error",
        "Material not found" => "material_not_found",
        "Extraction failure" => "extraction_failure",
        "Backend timeout" => "backend_timeout",
        "Backend error" => "backend_error",
        "Persistence error" => "persistence_failure",
        "Job error" => "job_error",
        "Serialization error" => "serialization_error",
        "Configuration error" => "config_error",
        "Invalid input" => "invalid_input",
        "I/O error" => "io_error",
        _ if message.starts_with("Job exceeded timeout") => "backend_timeout",
        _ => "internal_error",
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let inference_available = state.backend.health_check().await.unwrap_or(false);
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "inference_available": inference_available,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct EnqueueReviewerRequest {
    priority: Option<i32>,
}

async fn enqueue_reviewer(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
    body: Option<Json<EnqueueReviewerRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let priority = body
        .and_then(|Json(b)| b.priority)
        .unwrap_or(defaults::JOB_PRIORITY);

    let job_id = state
        .repo
        .enqueue(material_id, JobType::Reviewer, priority, None)
        .await?;

    info!(%job_id, %material_id, priority, "Reviewer job queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "job_id": job_id,
            "status": JobStatus::Pending.as_str(),
        })),
    ))
}

/// Wire shape of one job in status responses.
fn job_response(job: &Job) -> serde_json::Value {
    let mut body = serde_json::json!({
        "job_id": job.id,
        "material_id": job.material_id,
        "job_type": job.job_type.as_str(),
        "status": job.status.as_str(),
        "priority": job.priority,
        "attempt_count": job.attempt_count,
        "max_attempts": job.max_attempts,
        "created_at": job.created_at,
        "started_at": job.started_at,
        "completed_at": job.completed_at,
    });

    if let Some(result) = &job.result {
        body["result"] = result.clone();
    }
    if let Some(message) = &job.error_message {
        body["error"] = serde_json::json!({
            "code": error_code_for(message),
            "message": message,
        });
    }
    body
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .repo
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;
    Ok(Json(job_response(&job)))
}

#[derive(Debug, Deserialize)]
struct ListJobsQuery {
    limit: Option<i64>,
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let jobs = state.repo.list_recent(limit).await?;
    let jobs: Vec<_> = jobs.iter().map(job_response).collect();
    Ok(Json(serde_json::json!({ "jobs": jobs })))
}

async fn queue_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.repo.queue_stats().await?;
    Ok(Json(stats))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use revio_db::MemoryJobRepository;
    use revio_inference::MockInferenceBackend;
    use tower::util::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            repo: Arc::new(MemoryJobRepository::new()),
            backend: Arc::new(MockInferenceBackend::new()),
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_inference_availability() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["inference_available"], true);
    }

    #[tokio::test]
    async fn enqueue_returns_accepted_with_pending_job() {
        let state = test_state();
        let app = router(state.clone());

        let material_id = Uuid::new_v4();
        let response = app
            .oneshot(
                Request::post(format!("/api/materials/{material_id}/reviewer"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = body_json(response).await;
        assert_eq!(body["status"], "pending");
        let job_id: Uuid = serde_json::from_value(body["job_id"].clone()).unwrap();

        let job = state.repo.get(job_id).await.unwrap().unwrap();
        assert_eq!(job.material_id, material_id);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn get_unknown_job_is_404() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::get(format!("/api/jobs/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn failed_job_exposes_stable_error_code() {
        let state = test_state();
        let job_id = state
            .repo
            .enqueue(Uuid::new_v4(), JobType::Reviewer, 0, None)
            .await
            .unwrap();
        state.repo.claim_next().await.unwrap();
        state
            .repo
            .fail_permanent(job_id, "Extraction failure: no usable text after cleaning")
            .await
            .unwrap();

        let app = router(state);
        let response = app
            .oneshot(
                Request::get(format!("/api/jobs/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["error"]["code"], "extraction_failure");
    }

    #[tokio::test]
    async fn stats_count_queued_jobs() {
        let state = test_state();
        for _ in 0..3 {
            state
                .repo
                .enqueue(Uuid::new_v4(), JobType::Reviewer, 0, None)
                .await
                .unwrap();
        }

        let app = router(state);
        let response = app
            .oneshot(Request::get("/api/jobs/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["pending"], 3);
        assert_eq!(body["total"], 3);
    }

    #[test]
    fn error_codes_match_failure_classes() {
        assert_eq!(error_code_for("Backend timeout: summarize"), "backend_timeout");
        assert_eq!(
            error_code_for("Material not found: 00000000-0000-0000-0000-000000000000"),
            "material_not_found"
        );
        assert_eq!(error_code_for("Job exceeded timeout of 120s"), "backend_timeout");
        assert_eq!(error_code_for("something unrecognized"), "internal_error");
    }
}
