//! # revio-pipeline
//!
//! The multi-stage text pipeline that turns noisy extracted text into a
//! structured reviewer document:
//!
//! 1. [`cleaner`]: normalizes scan/OCR noise into clean prose.
//! 2. [`detector`]: parses cleaned text into typed, atomic concepts.
//! 3. [`formatter`]: renders each concept type into a presentation block.
//! 4. [`cluster`]: groups concepts into topics (embeddings, with a
//!    heuristic fallback that never fails).
//! 5. [`quality`]: scores the assembled document on four dimensions.
//!
//! [`orchestrator`] sequences the stages into one call, optionally invoking
//! an external model backend to compress overly long spans first.

pub mod cleaner;
pub mod cluster;
pub mod detector;
pub mod formatter;
pub mod orchestrator;
pub mod quality;

pub use cleaner::{clean, compress_definition};
pub use cluster::{cluster_concepts, cosine_similarity, fallback_by_type, ClusterOutcome};
pub use detector::detect_concepts;
pub use formatter::{category_for, format_concept, ReviewerDocumentBuilder};
pub use orchestrator::{OrchestratorOptions, ReviewerOrchestrator};
pub use quality::validate;
