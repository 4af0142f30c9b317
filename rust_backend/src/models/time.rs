//! Time primitives shared by the storage and aggregation layers.
//!
//! Instants are carried as `chrono::DateTime<Utc>` and persisted as epoch
//! milliseconds. Local (wall-clock) bounds are `NaiveDateTime` and only become
//! instants once a zone offset is applied.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds in one calendar day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Largest offset accepted from storage or callers, in seconds (+/- 18 hours).
const MAX_OFFSET_SECONDS: i32 = 18 * 3600;

/// A local time-zone offset from UTC, in whole seconds.
///
/// Absence of an offset is always modelled as `Option<ZoneOffset>::None`,
/// never as a zero offset: `UTC` is `ZoneOffset::UTC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct ZoneOffset(i32);

impl ZoneOffset {
    pub const UTC: ZoneOffset = ZoneOffset(0);

    /// Build an offset from total seconds, rejecting values outside +/- 18 hours.
    pub fn from_seconds(total_seconds: i32) -> Option<Self> {
        if (-MAX_OFFSET_SECONDS..=MAX_OFFSET_SECONDS).contains(&total_seconds) {
            Some(Self(total_seconds))
        } else {
            None
        }
    }

    pub fn from_hours(hours: i32) -> Option<Self> {
        hours.checked_mul(3600).and_then(Self::from_seconds)
    }

    pub fn total_seconds(&self) -> i32 {
        self.0
    }
}

impl Default for ZoneOffset {
    fn default() -> Self {
        Self::UTC
    }
}

impl TryFrom<i32> for ZoneOffset {
    type Error = String;

    fn try_from(total_seconds: i32) -> Result<Self, Self::Error> {
        Self::from_seconds(total_seconds).ok_or_else(|| {
            format!(
                "zone offset {}s outside +/-{}s",
                total_seconds, MAX_OFFSET_SECONDS
            )
        })
    }
}

impl From<ZoneOffset> for i32 {
    fn from(offset: ZoneOffset) -> Self {
        offset.0
    }
}

/// Convert epoch milliseconds into a UTC instant.
pub fn instant_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Days since 1970-01-01 for a calendar date.
pub fn epoch_day(date: NaiveDate) -> i64 {
    i64::from(chrono::Datelike::num_days_from_ce(&date)) - EPOCH_DAYS_FROM_CE
}

/// Calendar date for a day count since 1970-01-01.
pub fn date_from_epoch_day(day: i64) -> Option<NaiveDate> {
    let ce_day = i32::try_from(day + EPOCH_DAYS_FROM_CE).ok()?;
    NaiveDate::from_num_days_from_ce_opt(ce_day)
}

/// Midnight of the given epoch day as a local date-time.
pub fn local_midnight(day: i64) -> Option<NaiveDateTime> {
    date_from_epoch_day(day).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Interpret a wall-clock value in `zone` as an instant; `None` when the
/// result falls outside the representable range.
pub fn local_to_instant(local: NaiveDateTime, zone: ZoneOffset) -> Option<DateTime<Utc>> {
    local
        .checked_sub_signed(Duration::seconds(i64::from(zone.total_seconds())))
        .map(|utc_naive| Utc.from_utc_datetime(&utc_naive))
}

/// Wall-clock value of an instant seen from `zone`; `None` when the result
/// falls outside the representable range.
pub fn instant_to_local(instant: DateTime<Utc>, zone: ZoneOffset) -> Option<NaiveDateTime> {
    instant
        .naive_utc()
        .checked_add_signed(Duration::seconds(i64::from(zone.total_seconds())))
}

/// The two shapes a caller may use to bound a query.
///
/// `Instant` bounds are absolute. `Local` bounds are wall-clock values that
/// are resolved against the zone offset supplied with the request. Both
/// shapes require `start <= end`, also when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", try_from = "RawTimeRange")]
pub enum TimeRangeFilter {
    Instant {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Local {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl TimeRangeFilter {
    /// Build an absolute range; `None` unless `start <= end`.
    pub fn instant(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self::Instant { start, end })
    }

    /// Build a wall-clock range; `None` unless `start <= end`.
    pub fn local(start: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        (start <= end).then_some(Self::Local { start, end })
    }

    /// Build an absolute range from epoch milliseconds.
    pub fn from_millis(start: i64, end: i64) -> Option<Self> {
        Self::instant(instant_from_millis(start)?, instant_from_millis(end)?)
    }

    /// Range start as an instant; `None` if a local bound overflows in `zone`.
    pub fn start_instant(&self, zone: ZoneOffset) -> Option<DateTime<Utc>> {
        match *self {
            Self::Instant { start, .. } => Some(start),
            Self::Local { start, .. } => local_to_instant(start, zone),
        }
    }

    pub fn end_instant(&self, zone: ZoneOffset) -> Option<DateTime<Utc>> {
        match *self {
            Self::Instant { end, .. } => Some(end),
            Self::Local { end, .. } => local_to_instant(end, zone),
        }
    }

    pub fn start_local(&self, zone: ZoneOffset) -> Option<NaiveDateTime> {
        match *self {
            Self::Instant { start, .. } => instant_to_local(start, zone),
            Self::Local { start, .. } => Some(start),
        }
    }

    pub fn end_local(&self, zone: ZoneOffset) -> Option<NaiveDateTime> {
        match *self {
            Self::Instant { end, .. } => instant_to_local(end, zone),
            Self::Local { end, .. } => Some(end),
        }
    }

    /// The range as a half-open millisecond window, or `None` when a bound
    /// cannot be resolved in `zone`.
    pub fn window(&self, zone: ZoneOffset) -> Option<TimeWindow> {
        Some(TimeWindow::new(
            self.start_instant(zone)?.timestamp_millis(),
            self.end_instant(zone)?.timestamp_millis(),
        ))
    }
}

/// Unchecked wire shape of [`TimeRangeFilter`].
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RawTimeRange {
    Instant {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Local {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl TryFrom<RawTimeRange> for TimeRangeFilter {
    type Error = String;

    fn try_from(raw: RawTimeRange) -> Result<Self, Self::Error> {
        let range = match raw {
            RawTimeRange::Instant { start, end } => Self::instant(start, end),
            RawTimeRange::Local { start, end } => Self::local(start, end),
        };
        range.ok_or_else(|| "time range start is after its end".to_string())
    }
}

/// Half-open `[start, end)` window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, millis: i64) -> bool {
        self.start <= millis && millis < self.end
    }

    pub fn len_millis(&self) -> i64 {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_zone_offset_bounds() {
        assert!(ZoneOffset::from_seconds(18 * 3600).is_some());
        assert!(ZoneOffset::from_seconds(-18 * 3600).is_some());
        assert!(ZoneOffset::from_seconds(18 * 3600 + 1).is_none());
        assert_eq!(ZoneOffset::from_hours(2).unwrap().total_seconds(), 7200);
    }

    #[test]
    fn test_epoch_day_round_trip() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(epoch_day(epoch), 0);

        let date = NaiveDate::from_ymd_opt(2023, 3, 15).unwrap();
        let day = epoch_day(date);
        assert_eq!(day, 19_431);
        assert_eq!(date_from_epoch_day(day), Some(date));
        assert_eq!(local_midnight(day), Some(local(2023, 3, 15, 0)));
    }

    #[test]
    fn test_local_range_resolves_against_zone() {
        let zone = ZoneOffset::from_hours(2).unwrap();
        let range = TimeRangeFilter::local(local(2023, 1, 1, 2), local(2023, 1, 1, 4)).unwrap();

        let start = range.start_instant(zone).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(range.window(zone).unwrap().len_millis(), 2 * 3_600_000);
    }

    #[test]
    fn test_instant_range_to_local() {
        let zone = ZoneOffset::from_hours(-5).unwrap();
        let range = TimeRangeFilter::instant(
            Utc.with_ymd_and_hms(2023, 1, 2, 3, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 3, 3, 0, 0).unwrap(),
        )
        .unwrap();

        assert_eq!(range.start_local(zone), Some(local(2023, 1, 1, 22)));
        assert_eq!(range.end_local(zone), Some(local(2023, 1, 2, 22)));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(TimeRangeFilter::from_millis(10, 5).is_none());
        assert!(TimeRangeFilter::from_millis(5, 5).is_some());
    }

    #[test]
    fn test_local_bound_overflow_is_unresolvable() {
        let zone = ZoneOffset::from_hours(-10).unwrap();
        let range = TimeRangeFilter::local(local(2023, 1, 1, 0), NaiveDateTime::MAX).unwrap();

        assert!(range.start_instant(zone).is_some());
        assert_eq!(range.end_instant(zone), None);
        assert_eq!(range.window(zone), None);
        assert_eq!(local_to_instant(NaiveDateTime::MIN, ZoneOffset::from_hours(10).unwrap()), None);
    }

    #[test]
    fn test_zone_offset_deserialization_is_range_checked() {
        let offset: ZoneOffset = serde_json::from_str("-18000").unwrap();
        assert_eq!(offset.total_seconds(), -18000);
        assert_eq!(serde_json::to_string(&offset).unwrap(), "-18000");

        assert!(serde_json::from_str::<ZoneOffset>("100000").is_err());
        assert!(serde_json::from_str::<Option<ZoneOffset>>("-64801").is_err());
    }

    #[test]
    fn test_inverted_range_rejected_on_deserialize() {
        let ok: TimeRangeFilter = serde_json::from_str(
            r#"{"kind":"local","start":"2023-01-01T00:00:00","end":"2023-01-02T00:00:00"}"#,
        )
        .unwrap();
        assert_eq!(ok, TimeRangeFilter::local(local(2023, 1, 1, 0), local(2023, 1, 2, 0)).unwrap());

        let inverted = serde_json::from_str::<TimeRangeFilter>(
            r#"{"kind":"instant","start":"2023-01-02T00:00:00Z","end":"2023-01-01T00:00:00Z"}"#,
        );
        assert!(inverted.is_err());
    }

    #[test]
    fn test_window_contains_is_half_open() {
        let window = TimeWindow::new(0, 1000);
        assert!(window.contains(0));
        assert!(window.contains(999));
        assert!(!window.contains(1000));
    }
}
