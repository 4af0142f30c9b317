//! Query parameters accepted by the read and aggregate paths.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::AggregationKind;
use super::record::{DataOrigin, Record, RecordType};
use super::time::TimeRangeFilter;

/// Read request: either a filtered, paged scan or an explicit id lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReadRecordsRequest {
    Filters(ReadRecordsFilter),
    Ids { record_type: RecordType, ids: Vec<Uuid> },
}

impl ReadRecordsRequest {
    pub fn record_type(&self) -> RecordType {
        match self {
            ReadRecordsRequest::Filters(filter) => filter.record_type,
            ReadRecordsRequest::Ids { record_type, .. } => *record_type,
        }
    }
}

/// Filtered scan parameters.
///
/// An absent `time_range` means the scan is unbounded in time. An empty
/// `data_origins` list accepts every package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRecordsFilter {
    pub record_type: RecordType,
    #[serde(default)]
    pub data_origins: Vec<DataOrigin>,
    #[serde(default)]
    pub time_range: Option<TimeRangeFilter>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub page_token: Option<u64>,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

impl ReadRecordsFilter {
    pub fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            data_origins: Vec::new(),
            time_range: None,
            page_size: None,
            page_token: None,
            ascending: true,
        }
    }

    pub fn time_range(mut self, range: TimeRangeFilter) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn data_origin(mut self, origin: DataOrigin) -> Self {
        self.data_origins.push(origin);
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn page_token(mut self, token: u64) -> Self {
        self.page_token = Some(token);
        self
    }

    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }
}

/// One page of decoded records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRecordsResponse {
    pub records: Vec<Record>,
    pub next_page_token: Option<u64>,
}

/// Width of an aggregation bucket.
///
/// `Duration` buckets are fixed wall-clock lengths. `Period` buckets are
/// whole calendar days counted from the local date of the range start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum BucketSize {
    Duration { millis: i64 },
    Period { days: u32 },
}

impl BucketSize {
    /// Fixed-duration bucket; `None` unless the duration is positive.
    pub fn duration(width: Duration) -> Option<Self> {
        let millis = width.num_milliseconds();
        (millis > 0).then_some(Self::Duration { millis })
    }

    /// Calendar-period bucket; `None` unless at least one day.
    pub fn days(days: u32) -> Option<Self> {
        (days > 0).then_some(Self::Period { days })
    }

    pub fn is_positive(&self) -> bool {
        match *self {
            BucketSize::Duration { millis } => millis > 0,
            BucketSize::Period { days } => days > 0,
        }
    }
}

/// Aggregation request over one time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub kinds: Vec<AggregationKind>,
    pub time_range: TimeRangeFilter,
    #[serde(default)]
    pub data_origins: Vec<DataOrigin>,
    #[serde(default)]
    pub bucket: Option<BucketSize>,
}

impl AggregateRequest {
    pub fn new(kinds: Vec<AggregationKind>, time_range: TimeRangeFilter) -> Self {
        Self {
            kinds,
            time_range,
            data_origins: Vec::new(),
            bucket: None,
        }
    }

    pub fn grouped_by(mut self, bucket: BucketSize) -> Self {
        self.bucket = Some(bucket);
        self
    }

    pub fn data_origin(mut self, origin: DataOrigin) -> Self {
        self.data_origins.push(origin);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_size_must_be_positive() {
        assert!(BucketSize::duration(Duration::zero()).is_none());
        assert!(BucketSize::duration(Duration::milliseconds(-5)).is_none());
        assert_eq!(
            BucketSize::duration(Duration::hours(1)),
            Some(BucketSize::Duration { millis: 3_600_000 })
        );
        assert!(BucketSize::days(0).is_none());
        assert!(!BucketSize::Period { days: 0 }.is_positive());
    }

    #[test]
    fn test_read_filter_defaults_from_json() {
        let json = r#"{"mode": "filters", "record_type": "STEPS"}"#;
        let request: ReadRecordsRequest = serde_json::from_str(json).unwrap();

        match request {
            ReadRecordsRequest::Filters(filter) => {
                assert!(filter.ascending);
                assert!(filter.time_range.is_none());
                assert!(filter.page_size.is_none());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_request_from_json() {
        let json = r#"{
            "kinds": ["HEART_RATE_BPM_AVG"],
            "time_range": {"kind": "instant", "start": "2023-01-01T00:00:00Z", "end": "2023-01-01T02:00:00Z"},
            "bucket": {"unit": "duration", "millis": 3600000}
        }"#;
        let request: AggregateRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.kinds, vec![AggregationKind::HeartRateBpmAvg]);
        assert_eq!(request.bucket, Some(BucketSize::Duration { millis: 3_600_000 }));
        assert!(request.data_origins.is_empty());
    }
}
