//! Domain models for health records, queries and aggregate results.
//!
//! - [`record`]: typed records and their payloads
//! - [`aggregate`]: aggregation kinds and per-bucket results
//! - [`request`]: read and aggregate query parameters
//! - [`time`]: zone offsets, time ranges and epoch-day arithmetic

pub mod aggregate;
pub mod record;
pub mod request;
pub mod time;

pub use aggregate::{
    AggregateOperator, AggregateRecordsResponse, AggregateResult, AggregateValue,
    AggregationKind, ValueKind,
};
pub use record::{DataOrigin, HeartRateSample, Record, RecordPayload, RecordType};
pub use request::{
    AggregateRequest, BucketSize, ReadRecordsFilter, ReadRecordsRequest, ReadRecordsResponse,
};
pub use time::{TimeRangeFilter, TimeWindow, ZoneOffset};
