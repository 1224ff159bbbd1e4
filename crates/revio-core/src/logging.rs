//! Structured logging field name constants for revio.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (concepts, sentences) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "jobs", "pipeline"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "enqueue", "claim_next", "summarize", "embed", "generate_reviewer"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Material UUID being operated on.
pub const MATERIAL_ID: &str = "material_id";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job type enum variant.
pub const JOB_TYPE: &str = "job_type";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of concepts detected in a pipeline run.
pub const CONCEPT_COUNT: &str = "concept_count";

/// Number of topics produced by clustering.
pub const TOPIC_COUNT: &str = "topic_count";

/// Character length of a text span.
pub const TEXT_LEN: &str = "text_len";

/// Attempt number for a job execution.
pub const ATTEMPT: &str = "attempt";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
