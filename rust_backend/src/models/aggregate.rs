//! Aggregation kinds and aggregate result values.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::{DataOrigin, RecordType};
use super::time::ZoneOffset;

/// Statistical operator applied by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOperator {
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateOperator {
    pub fn sql_name(self) -> &'static str {
        match self {
            AggregateOperator::Sum => "SUM",
            AggregateOperator::Min => "MIN",
            AggregateOperator::Max => "MAX",
            AggregateOperator::Avg => "AVG",
        }
    }
}

/// Numeric shape of an aggregate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Long,
    Double,
}

/// A named statistical operator scoped to one metric of one record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationKind {
    StepsCountTotal,
    HeartRateBpmMax,
    HeartRateBpmMin,
    HeartRateBpmAvg,
    ElevationGainedTotal,
}

impl AggregationKind {
    pub const ALL: [AggregationKind; 5] = [
        AggregationKind::StepsCountTotal,
        AggregationKind::HeartRateBpmMax,
        AggregationKind::HeartRateBpmMin,
        AggregationKind::HeartRateBpmAvg,
        AggregationKind::ElevationGainedTotal,
    ];

    /// Stable numeric identifier used on the wire.
    pub fn id(self) -> i32 {
        match self {
            AggregationKind::StepsCountTotal => 1,
            AggregationKind::HeartRateBpmMax => 2,
            AggregationKind::HeartRateBpmMin => 3,
            AggregationKind::HeartRateBpmAvg => 4,
            AggregationKind::ElevationGainedTotal => 5,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    /// Record type whose metric this kind aggregates.
    pub fn record_type(self) -> RecordType {
        match self {
            AggregationKind::StepsCountTotal => RecordType::Steps,
            AggregationKind::HeartRateBpmMax
            | AggregationKind::HeartRateBpmMin
            | AggregationKind::HeartRateBpmAvg => RecordType::HeartRate,
            AggregationKind::ElevationGainedTotal => RecordType::ElevationGained,
        }
    }

    pub fn operator(self) -> AggregateOperator {
        match self {
            AggregationKind::StepsCountTotal | AggregationKind::ElevationGainedTotal => {
                AggregateOperator::Sum
            }
            AggregationKind::HeartRateBpmMax => AggregateOperator::Max,
            AggregationKind::HeartRateBpmMin => AggregateOperator::Min,
            AggregationKind::HeartRateBpmAvg => AggregateOperator::Avg,
        }
    }

    pub fn value_kind(self) -> ValueKind {
        match self {
            AggregationKind::ElevationGainedTotal => ValueKind::Double,
            _ => ValueKind::Long,
        }
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A typed aggregate value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateValue {
    Long(i64),
    Double(f64),
}

impl AggregateValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            AggregateValue::Long(v) => v as f64,
            AggregateValue::Double(v) => v,
        }
    }
}

/// Result of one aggregation kind over one bucket.
///
/// `value` is `None` when no rows contributed, which is distinct from a zero
/// aggregate. `zone_offset` is `None` when the contributing rows carried no
/// offset, which is distinct from UTC.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateResult {
    pub value: Option<AggregateValue>,
    pub zone_offset: Option<ZoneOffset>,
    #[serde(default)]
    pub data_origins: BTreeSet<DataOrigin>,
}

impl AggregateResult {
    pub fn new(value: AggregateValue) -> Self {
        Self {
            value: Some(value),
            ..Default::default()
        }
    }

    /// A result with no contributing rows.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn with_zone_offset(mut self, zone_offset: Option<ZoneOffset>) -> Self {
        self.zone_offset = zone_offset;
        self
    }

    pub fn with_data_origins<I: IntoIterator<Item = DataOrigin>>(mut self, origins: I) -> Self {
        self.data_origins = origins.into_iter().collect();
        self
    }

    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }
}

/// Aggregate results for one bucket, keyed by aggregation kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateRecordsResponse {
    results: BTreeMap<AggregationKind, AggregateResult>,
}

impl AggregateRecordsResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: AggregationKind, result: AggregateResult) {
        self.results.insert(kind, result);
    }

    pub fn get(&self, kind: AggregationKind) -> Option<&AggregateResult> {
        self.results.get(&kind)
    }

    pub fn results(&self) -> &BTreeMap<AggregationKind, AggregateResult> {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl FromIterator<(AggregationKind, AggregateResult)> for AggregateRecordsResponse {
    fn from_iter<I: IntoIterator<Item = (AggregationKind, AggregateResult)>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ids_are_stable() {
        for kind in AggregationKind::ALL {
            assert_eq!(AggregationKind::from_id(kind.id()), Some(kind));
        }
    }

    #[test]
    fn test_heart_rate_kinds_share_record_type() {
        assert_eq!(AggregationKind::HeartRateBpmMax.record_type(), RecordType::HeartRate);
        assert_eq!(AggregationKind::HeartRateBpmAvg.operator(), AggregateOperator::Avg);
        assert_eq!(AggregationKind::ElevationGainedTotal.value_kind(), ValueKind::Double);
    }

    #[test]
    fn test_absent_distinct_from_zero() {
        let absent = serde_json::to_value(AggregateResult::absent()).unwrap();
        let zero = serde_json::to_value(
            AggregateResult::new(AggregateValue::Long(0)).with_zone_offset(Some(ZoneOffset::UTC)),
        )
        .unwrap();

        assert!(absent["value"].is_null());
        assert!(absent["zone_offset"].is_null());
        assert_eq!(zero["value"], 0);
        assert_eq!(zero["zone_offset"], 0);
    }

    #[test]
    fn test_response_serializes_kind_keys() {
        let response: AggregateRecordsResponse = [(
            AggregationKind::StepsCountTotal,
            AggregateResult::new(AggregateValue::Long(10)),
        )]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["STEPS_COUNT_TOTAL"]["value"], 10);
    }
}
