//! # revio-core
//!
//! Core types, traits, and abstractions for the revio reviewer-generation
//! system.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other revio crates depend on: the job lifecycle types, the concept
//! and reviewer-document model, the error taxonomy, and the repository and
//! backend traits that enable pluggable storage and inference.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
