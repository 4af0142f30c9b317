//! Storage module for health records.
//!
//! This module provides abstractions for record storage via the Repository
//! pattern, allowing different storage backends to be swapped easily.
//!
//! # Architecture
//!
//! The storage module follows a layered architecture:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (CLI, transport adapters)            │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs) - Business Logic           │
//! │  - Request validation                                   │
//! │  - Bucket windows and response assembly                 │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository/) - Abstract Interface   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Registry (registry.rs) - schema, codec and plans       │
//! │  per record type                                        │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!         ┌───────────▼─────────────┐
//!         │  Local Repository       │
//!         │  (in-memory tables)     │
//!         └─────────────────────────┘
//! ```
//!
//! # Modules
//! - `services`: High-level operations (use these in your application!)
//! - `repository`: Trait definitions for storage operations
//! - `repositories::local`: In-memory table store
//! - `registry`: Per-record-type schema, codec and aggregation plans
//! - `schema`, `codec`, `cursor`: Table layout, row encoding and row access
//! - `aggregation`: Aggregation query plans and result extraction
//! - `factory`, `repo_config`: Repository construction from configuration
//!
//! # Recommended Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use health_records::db::{services, RecordTypeRegistry, RepositoryConfig, RepositoryFactory};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(RecordTypeRegistry::standard());
//!     let config = RepositoryConfig::default().with_env_overrides()?;
//!     let repo = RepositoryFactory::from_config(&config, registry)?;
//!
//!     let healthy = services::health_check(repo.as_ref()).await?;
//!     assert!(healthy);
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod codec;
pub mod cursor;
pub mod factory;
pub mod registry;
pub mod repo_config;
pub mod repositories;
pub mod repository;
pub mod schema;
pub mod services;

// ==================== Service Layer ====================

pub use services::{aggregate, health_check, insert_records, read_records};

// ==================== Repository Pattern Exports ====================

pub use aggregation::AggregationPlan;
pub use codec::RecordCodec;
pub use cursor::{MemoryCursor, Row, RowCursor, SqlValue};
pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use registry::{RecordTypeEntry, RecordTypeRegistry, RegistryBuilder};
pub use repo_config::RepositoryConfig;
pub use repositories::LocalRepository;
pub use repository::{
    AggregationRepository, FullRepository, RecordRepository, RepositoryError, RepositoryResult,
};
pub use schema::{RecordSchema, StorageKind};
