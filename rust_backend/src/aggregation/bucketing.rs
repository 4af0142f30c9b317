//! Bucketing engine.
//!
//! A grid splits a requested time range into buckets of fixed duration or of
//! whole calendar days. The grid yields the windows each aggregation query
//! runs over, and later zips the per-bucket results back onto labeled,
//! contiguous groups.
//!
//! Duration buckets are measured in epoch milliseconds from the exact range
//! start. Period buckets are measured in whole days from the local date of
//! the range start, expressed as an epoch-day count, so the first bucket may
//! begin before the range start.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{AggregationError, AggregationResult};
use crate::models::time::{
    epoch_day, instant_from_millis, local_midnight, local_to_instant, MILLIS_PER_DAY,
};
use crate::models::{AggregateRecordsResponse, TimeRangeFilter, TimeWindow, ZoneOffset};

/// One fixed-duration bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationGroup {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub result: AggregateRecordsResponse,
}

/// One calendar-period bucket, in local time.
///
/// `start_time` and `end_time` are the bucket bounds clamped to the requested
/// range. `label` is the display value: the exact range start for the first
/// group, the exact range end for the last group and the grid start of the
/// bucket otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodGroup {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub label: NaiveDateTime,
    pub result: AggregateRecordsResponse,
}

/// Largest number of buckets a single request may produce. Each bucket
/// costs one storage query per requested kind.
pub const MAX_BUCKET_COUNT: usize = 100_000;

fn ceil_div(span: i64, width: i64) -> usize {
    if span <= 0 {
        return 0;
    }
    let buckets = span / width + i64::from(span % width != 0);
    usize::try_from(buckets).unwrap_or(usize::MAX)
}

fn out_of_range(what: &str) -> AggregationError {
    AggregationError::InvalidRequest(format!("{} is outside the supported time range", what))
}

fn check_bucket_limit(count: usize) -> AggregationResult<()> {
    if count > MAX_BUCKET_COUNT {
        return Err(AggregationError::InvalidRequest(format!(
            "request spans {} buckets, more than the limit of {}",
            count, MAX_BUCKET_COUNT
        )));
    }
    Ok(())
}

/// Fails unless `actual` results cover exactly the `expected` buckets.
/// An empty result list is always accepted.
fn check_count(expected: usize, actual: usize) -> AggregationResult<()> {
    if actual != 0 && actual != expected {
        return Err(AggregationError::BucketCountMismatch { expected, actual });
    }
    Ok(())
}

/// Fixed-duration bucket grid over `[start, end)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationGrid {
    start: i64,
    end: i64,
    width: i64,
}

impl DurationGrid {
    pub fn new(
        range: &TimeRangeFilter,
        zone: ZoneOffset,
        width_millis: i64,
    ) -> AggregationResult<Self> {
        if width_millis <= 0 {
            return Err(AggregationError::InvalidBucketSize(format!(
                "duration must be positive, got {}ms",
                width_millis
            )));
        }
        let window = range.window(zone).ok_or_else(|| out_of_range("time range"))?;
        let grid = Self {
            start: window.start,
            end: window.end,
            width: width_millis,
        };
        check_bucket_limit(grid.bucket_count())?;
        Ok(grid)
    }

    pub fn bucket_count(&self) -> usize {
        ceil_div(self.end - self.start, self.width)
    }

    /// Grid bounds of bucket `index`: `[S + i*W, S + (i+1)*W)`.
    pub fn bucket(&self, index: usize) -> TimeWindow {
        let offset = self.width.saturating_mul(index as i64);
        let start = self.start.saturating_add(offset);
        TimeWindow::new(start, start.saturating_add(self.width))
    }

    /// Windows to aggregate over, the last one clamped to the range end.
    pub fn query_windows(&self) -> Vec<TimeWindow> {
        (0..self.bucket_count())
            .map(|i| {
                let bucket = self.bucket(i);
                TimeWindow::new(bucket.start, bucket.end.min(self.end))
            })
            .collect()
    }
}

/// Zip per-bucket results onto duration buckets.
///
/// Group `i` spans exactly `[S + i*W, S + (i+1)*W)`.
pub fn group_by_duration(
    grid: &DurationGrid,
    results: Vec<AggregateRecordsResponse>,
) -> AggregationResult<Vec<DurationGroup>> {
    check_count(grid.bucket_count(), results.len())?;

    results
        .into_iter()
        .enumerate()
        .map(|(i, result)| {
            let bucket = grid.bucket(i);
            Ok(DurationGroup {
                start_time: instant_from_millis(bucket.start)
                    .ok_or_else(|| out_of_range("bucket start"))?,
                end_time: instant_from_millis(bucket.end)
                    .ok_or_else(|| out_of_range("bucket end"))?,
                result,
            })
        })
        .collect()
}

/// Calendar-period bucket grid of whole days, anchored at local midnight of
/// the range start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodGrid {
    start: NaiveDateTime,
    end: NaiveDateTime,
    anchor_day: i64,
    days: u32,
    zone: ZoneOffset,
}

impl PeriodGrid {
    pub fn new(range: &TimeRangeFilter, zone: ZoneOffset, days: u32) -> AggregationResult<Self> {
        if days == 0 {
            return Err(AggregationError::InvalidBucketSize(
                "period must span at least one day".to_string(),
            ));
        }
        let start = range
            .start_local(zone)
            .ok_or_else(|| out_of_range("time range start"))?;
        let end = range
            .end_local(zone)
            .ok_or_else(|| out_of_range("time range end"))?;
        let grid = Self {
            start,
            end,
            anchor_day: epoch_day(start.date()),
            days,
            zone,
        };
        check_bucket_limit(grid.bucket_count())?;
        Ok(grid)
    }

    pub fn anchor_day(&self) -> i64 {
        self.anchor_day
    }

    pub fn bucket_count(&self) -> usize {
        if self.end <= self.start {
            return 0;
        }
        match local_midnight(self.anchor_day) {
            Some(anchor) => ceil_div(
                (self.end - anchor).num_milliseconds(),
                i64::from(self.days) * MILLIS_PER_DAY,
            ),
            None => 0,
        }
    }

    /// Grid bounds of bucket `index`, local midnight to local midnight.
    pub fn bucket(&self, index: usize) -> AggregationResult<(NaiveDateTime, NaiveDateTime)> {
        let first_day = i64::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(i64::from(self.days)))
            .and_then(|offset| offset.checked_add(self.anchor_day))
            .ok_or_else(|| out_of_range("period bucket"))?;
        let start = local_midnight(first_day).ok_or_else(|| out_of_range("period bucket"))?;
        let end = local_midnight(first_day + i64::from(self.days))
            .ok_or_else(|| out_of_range("period bucket"))?;
        Ok((start, end))
    }

    /// Bucket bounds clamped to the requested range.
    pub fn clamped_bucket(&self, index: usize) -> AggregationResult<(NaiveDateTime, NaiveDateTime)> {
        let (start, end) = self.bucket(index)?;
        Ok((start.max(self.start), end.min(self.end)))
    }

    /// Windows to aggregate over, converted to instants through the zone.
    pub fn query_windows(&self) -> AggregationResult<Vec<TimeWindow>> {
        (0..self.bucket_count())
            .map(|i| {
                let (start, end) = self.clamped_bucket(i)?;
                let start = local_to_instant(start, self.zone)
                    .ok_or_else(|| out_of_range("period bucket start"))?;
                let end = local_to_instant(end, self.zone)
                    .ok_or_else(|| out_of_range("period bucket end"))?;
                Ok(TimeWindow::new(start.timestamp_millis(), end.timestamp_millis()))
            })
            .collect()
    }
}

/// Zip per-bucket results onto period buckets and apply the label
/// correction: the first group shows the exact range start, the last group
/// the exact range end.
pub fn group_by_period(
    grid: &PeriodGrid,
    results: Vec<AggregateRecordsResponse>,
) -> AggregationResult<Vec<PeriodGroup>> {
    check_count(grid.bucket_count(), results.len())?;

    let mut groups = results
        .into_iter()
        .enumerate()
        .map(|(i, result)| {
            let (grid_start, _) = grid.bucket(i)?;
            let (start_time, end_time) = grid.clamped_bucket(i)?;
            Ok(PeriodGroup {
                start_time,
                end_time,
                label: grid_start,
                result,
            })
        })
        .collect::<AggregationResult<Vec<_>>>()?;

    if let Some(first) = groups.first_mut() {
        first.label = grid.start;
    }
    if let Some(last) = groups.last_mut() {
        last.label = grid.end;
    }
    Ok(groups)
}
