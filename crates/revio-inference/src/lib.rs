//! # revio-inference
//!
//! Model inference backends for the revio pipeline.
//!
//! The pipeline consumes backends only through the [`revio_core`] traits
//! ([`EmbeddingBackend`], [`SummarizationBackend`], [`InferenceBackend`]),
//! so implementations are swappable:
//!
//! - [`ollama::OllamaBackend`]: production backend against a local Ollama
//!   server.
//! - [`mock::MockInferenceBackend`]: deterministic in-process backend for
//!   tests.
//!
//! [`EmbeddingBackend`]: revio_core::EmbeddingBackend
//! [`SummarizationBackend`]: revio_core::SummarizationBackend
//! [`InferenceBackend`]: revio_core::InferenceBackend

pub mod mock;
pub mod ollama;

pub use mock::MockInferenceBackend;
pub use ollama::OllamaBackend;
