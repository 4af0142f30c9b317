//! Response assembler.
//!
//! Collects the per-bucket result mappings produced by the aggregation queries
//! and shapes them into the caller's requested form: a single ungrouped
//! mapping, duration groups or period groups.

use serde::{Deserialize, Serialize};

use super::bucketing::{
    group_by_duration, group_by_period, DurationGrid, DurationGroup, PeriodGrid, PeriodGroup,
};
use super::error::{AggregationError, AggregationResult};
use crate::models::{AggregateRecordsResponse, TimeRangeFilter, ZoneOffset};

/// Final shape of an aggregation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "grouping", content = "data", rename_all = "snake_case")]
pub enum AggregationOutput {
    Ungrouped(AggregateRecordsResponse),
    ByDuration(Vec<DurationGroup>),
    ByPeriod(Vec<PeriodGroup>),
}

/// Per-bucket aggregate results plus the grouping parameters they were
/// computed for.
#[derive(Debug, Clone, Default)]
pub struct AggregateDataResponse {
    results: Vec<AggregateRecordsResponse>,
    duration_millis: Option<i64>,
    period_days: Option<u32>,
    time_range: Option<TimeRangeFilter>,
    zone: ZoneOffset,
}

impl AggregateDataResponse {
    pub fn new(results: Vec<AggregateRecordsResponse>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    /// Zone used to resolve local ranges and period labels.
    pub fn with_zone(mut self, zone: ZoneOffset) -> Self {
        self.zone = zone;
        self
    }

    pub fn set_time_range(&mut self, range: TimeRangeFilter) {
        self.time_range = Some(range);
    }

    pub fn set_duration(&mut self, millis: i64) {
        self.duration_millis = Some(millis);
    }

    pub fn set_period(&mut self, days: u32) {
        self.period_days = Some(days);
    }

    pub fn results(&self) -> &[AggregateRecordsResponse] {
        &self.results
    }

    /// The single ungrouped mapping, unmodified.
    pub fn first(self) -> AggregateRecordsResponse {
        self.results.into_iter().next().unwrap_or_default()
    }

    fn time_range(&self) -> AggregationResult<&TimeRangeFilter> {
        self.time_range.as_ref().ok_or_else(|| {
            AggregationError::Precondition("grouped output requires a time range".to_string())
        })
    }

    pub fn grouped_by_duration(self) -> AggregationResult<Vec<DurationGroup>> {
        let millis = self.duration_millis.ok_or_else(|| {
            AggregationError::Precondition(
                "duration grouping requested but no duration was set".to_string(),
            )
        })?;
        let grid = DurationGrid::new(self.time_range()?, self.zone, millis)?;
        group_by_duration(&grid, self.results)
    }

    pub fn grouped_by_period(self) -> AggregationResult<Vec<PeriodGroup>> {
        let days = self.period_days.ok_or_else(|| {
            AggregationError::Precondition(
                "period grouping requested but no period was set".to_string(),
            )
        })?;
        let grid = PeriodGrid::new(self.time_range()?, self.zone, days)?;
        group_by_period(&grid, self.results)
    }

    /// Shape the results according to whichever grouping was set.
    pub fn assemble(self) -> AggregationResult<AggregationOutput> {
        match (self.duration_millis, self.period_days) {
            (Some(_), Some(_)) => Err(AggregationError::Precondition(
                "both duration and period grouping were set".to_string(),
            )),
            (Some(_), None) => self.grouped_by_duration().map(AggregationOutput::ByDuration),
            (None, Some(_)) => self.grouped_by_period().map(AggregationOutput::ByPeriod),
            (None, None) => Ok(AggregationOutput::Ungrouped(self.first())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AggregateResult, AggregateValue, AggregationKind};

    const HOUR: i64 = 3_600_000;

    fn mapping(value: Option<i64>) -> AggregateRecordsResponse {
        let result = match value {
            Some(v) => AggregateResult::new(AggregateValue::Long(v)),
            None => AggregateResult::absent(),
        };
        std::iter::once((AggregationKind::HeartRateBpmAvg, result)).collect()
    }

    fn two_hours() -> TimeRangeFilter {
        TimeRangeFilter::from_millis(0, 2 * HOUR).unwrap()
    }

    #[test]
    fn test_ungrouped_returns_first_mapping() {
        let response = AggregateDataResponse::new(vec![mapping(Some(5))]);
        match response.assemble().unwrap() {
            AggregationOutput::Ungrouped(result) => assert_eq!(result, mapping(Some(5))),
            other => panic!("unexpected output {:?}", other),
        }
        assert!(AggregateDataResponse::new(vec![]).first().is_empty());
    }

    #[test]
    fn test_duration_grouping() {
        let mut response = AggregateDataResponse::new(vec![mapping(Some(80)), mapping(None)]);
        response.set_time_range(two_hours());
        response.set_duration(HOUR);

        let groups = response.grouped_by_duration().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].result, mapping(Some(80)));
        assert!(groups[1].result.get(AggregationKind::HeartRateBpmAvg).unwrap().is_absent());
    }

    #[test]
    fn test_grouping_without_size_is_precondition_violation() {
        let mut response = AggregateDataResponse::new(vec![mapping(Some(1))]);
        response.set_time_range(two_hours());
        response.set_period(1);
        assert!(matches!(
            response.clone().grouped_by_duration(),
            Err(AggregationError::Precondition(_))
        ));

        let mut response = AggregateDataResponse::new(vec![mapping(Some(1))]);
        response.set_time_range(two_hours());
        response.set_duration(HOUR);
        assert!(matches!(
            response.grouped_by_period(),
            Err(AggregationError::Precondition(_))
        ));
    }

    #[test]
    fn test_grouping_without_range_is_precondition_violation() {
        let mut response = AggregateDataResponse::new(vec![mapping(Some(1))]);
        response.set_duration(HOUR);
        assert!(matches!(response.assemble(), Err(AggregationError::Precondition(_))));
    }

    #[test]
    fn test_both_groupings_rejected() {
        let mut response = AggregateDataResponse::new(vec![]);
        response.set_time_range(two_hours());
        response.set_duration(HOUR);
        response.set_period(1);
        assert!(matches!(response.assemble(), Err(AggregationError::Precondition(_))));
    }

    #[test]
    fn test_output_serializes_with_grouping_tag() {
        let mut response = AggregateDataResponse::new(vec![mapping(Some(80)), mapping(None)]);
        response.set_time_range(two_hours());
        response.set_duration(HOUR);

        let json = serde_json::to_value(response.assemble().unwrap()).unwrap();
        assert_eq!(json["grouping"], "by_duration");
        assert_eq!(json["data"][0]["result"]["HEART_RATE_BPM_AVG"]["value"], 80);
        assert!(json["data"][1]["result"]["HEART_RATE_BPM_AVG"]["value"].is_null());
    }
}
