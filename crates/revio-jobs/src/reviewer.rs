//! Reviewer generation job handler.
//!
//! Wires the material collaborators to the pipeline: fetch the material,
//! extract its text, run the generation pipeline, and store the resulting
//! document as the job's result payload.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use revio_core::{Error, JobType, MaterialStore, TextExtractor};
use revio_pipeline::ReviewerOrchestrator;

use crate::handler::{JobContext, JobHandler, JobResult};

/// Handler that generates a reviewer document for a material.
pub struct ReviewerJobHandler {
    store: Arc<dyn MaterialStore>,
    extractor: Arc<dyn TextExtractor>,
    orchestrator: Arc<ReviewerOrchestrator>,
}

impl ReviewerJobHandler {
    pub fn new(
        store: Arc<dyn MaterialStore>,
        extractor: Arc<dyn TextExtractor>,
        orchestrator: Arc<ReviewerOrchestrator>,
    ) -> Self {
        Self {
            store,
            extractor,
            orchestrator,
        }
    }

    /// Map a pipeline error onto the job outcome: transient failures take
    /// the retry edge, everything else fails the job outright.
    fn route_error(err: Error) -> JobResult {
        if err.is_transient() {
            JobResult::Retry(err.to_string())
        } else {
            JobResult::Failed(err.to_string())
        }
    }
}

#[async_trait]
impl JobHandler for ReviewerJobHandler {
    fn job_type(&self) -> JobType {
        JobType::Reviewer
    }

    #[instrument(skip(self, ctx), fields(job_id = %ctx.job.id, material_id = %ctx.material_id()))]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        let material_id = ctx.material_id();

        let content = match self.store.fetch(material_id).await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "Failed to fetch material");
                return Self::route_error(e);
            }
        };

        let text = match self.extractor.extract(content).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to extract text from material");
                return Self::route_error(e);
            }
        };

        let document = match self.orchestrator.generate(material_id, &text).await {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Reviewer generation failed");
                return Self::route_error(e);
            }
        };

        info!(
            topic_count = document.topics.len(),
            overall = document.quality.overall,
            accepted = document.quality.meets_threshold(),
            "Reviewer document ready"
        );

        match serde_json::to_value(&document) {
            Ok(result) => JobResult::Success(result),
            Err(e) => {
                error!(error = %e, "Failed to serialize reviewer document");
                JobResult::Failed(format!("Serialization error: {e}"))
            }
        }
    }
}
