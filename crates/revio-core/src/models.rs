//! Core data model: jobs, concepts, topics, and reviewer documents.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;

// =============================================================================
// JOB TYPES
// =============================================================================

/// Type of background job.
///
/// Currently a single variant; the string form is what the row-store
/// persists, so new variants must pick a stable snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Generate a reviewer document for a material.
    Reviewer,
}

impl JobType {
    /// Stable string form for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Reviewer => "reviewer",
        }
    }

    /// Parse from the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reviewer" => Some(JobType::Reviewer),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a job.
///
/// Transitions only along `pending → processing → {completed | pending
/// (retry) | failed}`. The retry edge is bounded by the attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Stable string form for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse from the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted request to generate one reviewer document for one material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub material_id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: Option<JsonValue>,
    /// Set if and only if status is `completed`.
    pub result: Option<JsonValue>,
    /// Set if and only if status is `failed`.
    pub error_message: Option<String>,
    /// Number of transient failures recorded so far; never exceeds
    /// `max_attempts`. Permanent failures leave it untouched.
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// A pending job is claimable only once this instant has passed.
    /// Implements the retry backoff delay.
    pub available_at: DateTime<Utc>,
}

/// Queue statistics summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub total: i64,
}

/// Retry policy for transiently failed jobs.
///
/// Counts and timings are configuration, not hard-coded constants.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget (initial attempt + retries).
    pub max_attempts: i32,
    /// Backoff delays indexed by completed attempt number; the last entry
    /// repeats for any further attempts.
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::JOB_MAX_ATTEMPTS,
            backoff: defaults::JOB_BACKOFF_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }
}

impl RetryPolicy {
    /// Load policy from environment variables with fallback to defaults.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `REVIO_JOB_MAX_ATTEMPTS` | `3` | Attempt budget per job |
    /// | `REVIO_JOB_BACKOFF_SECS` | `5,15,45` | Comma-separated backoff delays |
    pub fn from_env() -> Self {
        let mut policy = Self::default();

        if let Ok(val) = std::env::var("REVIO_JOB_MAX_ATTEMPTS") {
            if let Ok(n) = val.parse::<i32>() {
                policy.max_attempts = n.max(1);
            } else {
                tracing::warn!(value = %val, "Invalid REVIO_JOB_MAX_ATTEMPTS, using default");
            }
        }

        if let Ok(val) = std::env::var("REVIO_JOB_BACKOFF_SECS") {
            let parsed: Vec<Duration> = val
                .split(',')
                .filter_map(|p| p.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .collect();
            if !parsed.is_empty() {
                policy.backoff = parsed;
            } else {
                tracing::warn!(value = %val, "Invalid REVIO_JOB_BACKOFF_SECS, using default");
            }
        }

        policy
    }

    /// Backoff delay before the next attempt, given the number of attempts
    /// already made (1-based).
    pub fn delay_for(&self, attempts_made: i32) -> Duration {
        if self.backoff.is_empty() {
            return Duration::ZERO;
        }
        let idx = (attempts_made.max(1) as usize - 1).min(self.backoff.len() - 1);
        self.backoff[idx]
    }
}

// =============================================================================
// CONCEPT TYPES
// =============================================================================

/// Discriminant for the typed concept variants the detector emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptType {
    Definition,
    Comparison,
    TypeList,
    Process,
    Example,
    Simple,
}

impl ConceptType {
    /// Human-readable label used for fallback topic titles.
    pub fn label(&self) -> &'static str {
        match self {
            ConceptType::Definition => "Definitions",
            ConceptType::Comparison => "Comparisons",
            ConceptType::TypeList => "Classifications",
            ConceptType::Process => "Processes",
            ConceptType::Example => "Examples",
            ConceptType::Simple => "Key Points",
        }
    }
}

/// One named side of a comparison concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSide {
    pub name: String,
    pub description: String,
}

/// The two named sides a comparison concept always carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSides {
    pub left: ComparisonSide,
    pub right: ComparisonSide,
}

/// Character range in the cleaned source text a concept was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

/// One atomic, typed unit of extracted knowledge.
///
/// Created transiently per pipeline run; persisted only as part of a
/// `ReviewerDocument`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub id: Uuid,
    pub term: String,
    pub concept_type: ConceptType,
    /// Compact definition, capped at roughly 28 words.
    pub short_definition: String,
    /// Expanded definition, capped at roughly 70 words.
    pub full_definition: String,
    /// Up to three supporting examples.
    #[serde(default)]
    pub examples: Vec<String>,
    /// Enumerated subtypes; non-empty only for `TypeList` concepts.
    #[serde(default)]
    pub subtypes: Vec<String>,
    /// Exactly two named sides; present only for `Comparison` concepts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonSides>,
    /// Related concept ids within the same run.
    #[serde(default)]
    pub related_ids: Vec<Uuid>,
    /// Normalized importance in [0, 1].
    pub importance: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_span: Option<SourceSpan>,
}

/// A named grouping of related concepts within a reviewer document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub title: String,
    /// Category tag driving display iconography.
    pub category: String,
    /// Ordered concept ids belonging to this topic.
    pub concept_ids: Vec<Uuid>,
}

// =============================================================================
// REVIEWER DOCUMENT
// =============================================================================

/// One formatted presentation block produced from a concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedBlock {
    pub concept_id: Uuid,
    pub concept_type: ConceptType,
    pub heading: String,
    /// Body lines rendered under the heading.
    pub lines: Vec<String>,
    pub icon: String,
}

/// A topic section of the final document: title, icon, formatted blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSection {
    pub title: String,
    pub icon: String,
    pub concepts: Vec<FormattedBlock>,
}

/// Four-dimension quality assessment of a reviewer document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub accuracy: f32,
    pub clarity: f32,
    pub separation: f32,
    pub structure: f32,
    /// Deterministic weighted combination of the four sub-scores.
    pub overall: f32,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl QualityMetrics {
    /// Whether the document passes the acceptance gate:
    /// overall >= 7.0 and every sub-score >= 6.0.
    pub fn meets_threshold(&self) -> bool {
        self.overall >= defaults::QUALITY_ACCEPT_OVERALL
            && self.accuracy >= defaults::QUALITY_ACCEPT_SUBSCORE
            && self.clarity >= defaults::QUALITY_ACCEPT_SUBSCORE
            && self.separation >= defaults::QUALITY_ACCEPT_SUBSCORE
            && self.structure >= defaults::QUALITY_ACCEPT_SUBSCORE
    }
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self {
            accuracy: 0.0,
            clarity: 0.0,
            separation: 0.0,
            structure: 0.0,
            overall: 0.0,
            issues: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Metadata recorded with every generated document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub pipeline_version: String,
    /// Backend model identifiers used during generation, if any.
    pub models_used: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// The final structured study artifact produced by one pipeline run.
///
/// Immutable once produced; stored as a job's result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerDocument {
    pub material_id: Uuid,
    pub topics: Vec<TopicSection>,
    /// Full serialized plain-text rendering of the document.
    pub rendered_text: String,
    pub quality: QualityMetrics,
    pub metadata: GenerationMetadata,
}

// =============================================================================
// MATERIALS
// =============================================================================

/// Resolved content of a stored material.
#[derive(Debug, Clone)]
pub enum MaterialContent {
    /// Raw bytes fetched directly by the worker.
    Bytes(Vec<u8>),
    /// Short-lived access URL for extraction outside the worker's trust
    /// boundary. The privileged credential never crosses this seam.
    SignedUrl {
        url: String,
        expires_at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_round_trip() {
        assert_eq!(JobType::parse(JobType::Reviewer.as_str()), Some(JobType::Reviewer));
        assert_eq!(JobType::parse("unknown"), None);
    }

    #[test]
    fn job_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("cancelled"), None);
    }

    #[test]
    fn job_status_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn retry_policy_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(15));
        assert_eq!(policy.delay_for(3), Duration::from_secs(45));
        // Past the end of the schedule, the last delay repeats.
        assert_eq!(policy.delay_for(7), Duration::from_secs(45));
    }

    #[test]
    fn retry_policy_empty_backoff_is_zero_delay() {
        let policy = RetryPolicy {
            max_attempts: 1,
            backoff: Vec::new(),
        };
        assert_eq!(policy.delay_for(1), Duration::ZERO);
    }

    #[test]
    fn quality_threshold_gate() {
        let passing = QualityMetrics {
            accuracy: 8.0,
            clarity: 7.5,
            separation: 9.0,
            structure: 6.5,
            overall: 7.8,
            issues: vec![],
            recommendations: vec![],
        };
        assert!(passing.meets_threshold());

        // One sub-score below 6.0 fails even with a high overall.
        let failing = QualityMetrics {
            structure: 5.5,
            overall: 7.8,
            ..passing.clone()
        };
        assert!(!failing.meets_threshold());

        let low_overall = QualityMetrics {
            overall: 6.9,
            ..passing
        };
        assert!(!low_overall.meets_threshold());
    }

    #[test]
    fn concept_type_labels_distinct() {
        let labels = [
            ConceptType::Definition.label(),
            ConceptType::Comparison.label(),
            ConceptType::TypeList.label(),
            ConceptType::Process.label(),
            ConceptType::Example.label(),
            ConceptType::Simple.label(),
        ];
        let mut unique = labels.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(labels.len(), unique.len());
    }

    #[test]
    fn reviewer_document_serializes_wire_shape() {
        let doc = ReviewerDocument {
            material_id: Uuid::nil(),
            topics: vec![TopicSection {
                title: "Data Structures".to_string(),
                icon: "computing".to_string(),
                concepts: vec![FormattedBlock {
                    concept_id: Uuid::nil(),
                    concept_type: ConceptType::Definition,
                    heading: "Array".to_string(),
                    lines: vec!["Contiguous block of memory".to_string()],
                    icon: "computing".to_string(),
                }],
            }],
            rendered_text: "Array\nContiguous block of memory".to_string(),
            quality: QualityMetrics::default(),
            metadata: GenerationMetadata {
                pipeline_version: "2.1".to_string(),
                models_used: vec![],
                generated_at: Utc::now(),
            },
        };

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["topics"][0]["title"], "Data Structures");
        assert_eq!(json["topics"][0]["concepts"][0]["heading"], "Array");
        assert!(json["quality"]["overall"].is_number());
        assert_eq!(json["metadata"]["pipeline_version"], "2.1");
    }
}
