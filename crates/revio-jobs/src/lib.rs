//! # revio-jobs
//!
//! Background job queue worker for revio.
//!
//! This crate provides:
//! - Async job processing with concurrent workers
//! - Retry routing: transient failures requeue with backoff, permanent
//!   failures terminate the job
//! - Worker lifecycle events via broadcast channels
//! - The reviewer generation handler and its material collaborators
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use revio_jobs::{
//!     FsMaterialStore, PlainTextExtractor, ReviewerJobHandler, WorkerBuilder, WorkerConfig,
//! };
//! use revio_pipeline::ReviewerOrchestrator;
//!
//! let handler = ReviewerJobHandler::new(
//!     Arc::new(FsMaterialStore::from_env()),
//!     Arc::new(PlainTextExtractor),
//!     Arc::new(ReviewerOrchestrator::new(backend)),
//! );
//!
//! let worker = WorkerBuilder::new(repo)
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(handler)
//!     .build()
//!     .await;
//!
//! let handle = worker.start();
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod handler;
pub mod material;
pub mod reviewer;
pub mod worker;

// Re-export core types
pub use revio_core::*;

pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler};
pub use material::{FsMaterialStore, MemoryMaterialStore, PlainTextExtractor};
pub use reviewer::ReviewerJobHandler;
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
