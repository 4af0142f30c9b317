//! Health records storage and aggregation.
//!
//! Typed health records (steps, elevation gained, heart rate series) are
//! stored through a repository, read back with filters and paging, and
//! aggregated over a time range, optionally bucketed by fixed durations or
//! calendar periods.
//!
//! - [`models`]: records, requests and aggregate results
//! - [`db`]: registry, codecs, repositories and the service layer
//! - [`aggregation`]: bucket grids and response assembly

pub mod aggregation;
pub mod db;
pub mod models;

pub use aggregation::{AggregationError, AggregationOutput, AggregationResult};
pub use db::{
    FullRepository, LocalRepository, RecordTypeRegistry, RepositoryConfig, RepositoryError,
    RepositoryResult,
};
pub use models::{
    AggregateRequest, AggregationKind, BucketSize, DataOrigin, Record, RecordPayload, RecordType,
    TimeRangeFilter, ZoneOffset,
};
