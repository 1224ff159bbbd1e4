//! # revio-db
//!
//! Durable job storage for revio.
//!
//! Two [`revio_core::JobRepository`] implementations share the same state
//! machine semantics:
//!
//! - [`jobs::PgJobRepository`]: PostgreSQL row store; the claim uses
//!   `FOR UPDATE SKIP LOCKED` so concurrent workers never double-claim.
//! - [`memory::MemoryJobRepository`]: mutex-guarded in-process store for
//!   tests and single-node deployments without Postgres.
//!
//! The schema lives in `migrations/`.

pub mod jobs;
pub mod memory;
pub mod pool;

pub use jobs::PgJobRepository;
pub use memory::MemoryJobRepository;
pub use pool::{create_pool, create_pool_with_config, run_migrations, PoolConfig};
