//! Error types for bucketing and response assembly.

use crate::db::repository::RepositoryError;

/// Result type for aggregation operations
pub type AggregationResult<T> = Result<T, AggregationError>;

/// Error type for aggregation operations
#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Internal misuse, e.g. period grouping requested with only a duration set.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Invalid bucket size: {0}")]
    InvalidBucketSize(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Bucket count mismatch: range implies {expected} buckets, got {actual} results")]
    BucketCountMismatch { expected: usize, actual: usize },
}
