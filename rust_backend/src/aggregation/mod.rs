//! Aggregation bucketing and response assembly.
//!
//! - [`bucketing`]: duration and calendar-period bucket grids
//! - [`response`]: shaping per-bucket results into the requested output
//! - [`error`]: error types for both

pub mod bucketing;
pub mod error;
pub mod response;

pub use bucketing::{
    group_by_duration, group_by_period, DurationGrid, DurationGroup, PeriodGrid, PeriodGroup,
};
pub use error::{AggregationError, AggregationResult};
pub use response::{AggregateDataResponse, AggregationOutput};
