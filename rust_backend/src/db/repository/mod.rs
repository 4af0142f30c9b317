//! Repository trait definitions for record storage.
//!
//! Responsibilities are split across focused traits so implementations and
//! callers can depend on only what they use.
//!
//! # Module Organization
//!
//! - [`error`]: Error types for repository operations
//! - [`records`]: Record insertion and the read path
//! - [`aggregate`]: Execution of aggregation plans over a time window
//!
//! # Convenience Trait Bound
//!
//! For functions that need every capability, use the [`FullRepository`] bound:
//!
//! ```ignore
//! async fn import<R: FullRepository>(repo: &R, records: &[Record]) -> RepositoryResult<()> {
//!     repo.insert_records(records).await?;
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod error;
pub mod records;

pub use aggregate::AggregationRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use records::RecordRepository;

/// Composite trait bound for a complete repository implementation.
///
/// Automatically implemented for any type implementing every repository trait.
pub trait FullRepository: RecordRepository + AggregationRepository {}

impl<T> FullRepository for T where T: RecordRepository + AggregationRepository {}
