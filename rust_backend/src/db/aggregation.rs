//! Aggregation resolver.
//!
//! Maps an `(record type, aggregation kind)` pair to the physical plan the
//! storage engine executes, and reads typed results back off the engine's
//! result row. Several kinds may read the same column and differ only in the
//! operator applied (the heart-rate min/max/avg kinds all read
//! `beats_per_minute`).

use std::fmt;

use super::cursor::RowCursor;
use super::repository::{RepositoryError, RepositoryResult};
use super::schema::{
    RecordSchema, APP_PACKAGE_COLUMN, BEATS_PER_MINUTE_COLUMN, COUNT_COLUMN, ELEVATION_COLUMN,
    PARENT_KEY_COLUMN, ROW_ID_COLUMN, START_TIME_COLUMN, START_ZONE_OFFSET_COLUMN,
};
use crate::models::{
    AggregateOperator, AggregateResult, AggregateValue, AggregationKind, DataOrigin, RecordType,
    ValueKind, ZoneOffset,
};

/// Result-row column carrying the zone offset of the contributing rows.
pub const RESULT_ZONE_OFFSET_COLUMN: &str = "zone_offset";
/// Result-row column carrying the distinct contributing package names.
pub const RESULT_DATA_ORIGINS_COLUMN: &str = "data_origins";

/// Join of a child (series) table against its parent table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlJoin {
    pub child_table: &'static str,
    pub parent_table: &'static str,
    pub child_key: &'static str,
    pub parent_key: &'static str,
}

impl fmt::Display for SqlJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "INNER JOIN {parent} ON {child}.{child_key} = {parent}.{parent_key}",
            parent = self.parent_table,
            child = self.child_table,
            child_key = self.child_key,
            parent_key = self.parent_key,
        )
    }
}

/// Physical plan for one aggregation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationPlan {
    pub kind: AggregationKind,
    pub operator: AggregateOperator,
    /// Table the aggregated column is read from.
    pub source_table: &'static str,
    value_column: &'static str,
    /// Column that scopes rows to a time window. It lives on the parent table
    /// when a join is present.
    pub time_column: &'static str,
    pub zone_offset_column: &'static str,
    pub data_origin_column: &'static str,
    pub join: Option<SqlJoin>,
}

impl AggregationPlan {
    /// The column whose values the operator folds.
    pub fn value_column(&self) -> &'static str {
        self.value_column
    }

    /// Table owning the time, zone offset and package columns.
    pub fn time_table(&self) -> &'static str {
        self.join
            .as_ref()
            .map_or(self.source_table, |join| join.parent_table)
    }

    /// SQL text of the plan over a `[start, end)` window, for diagnostics.
    pub fn select_sql(&self) -> String {
        let meta = self.time_table();
        let mut sql = format!(
            "SELECT {op}({src}.{value}) AS {value}, {meta}.{zone} AS {zone_alias}, \
             GROUP_CONCAT(DISTINCT {meta}.{origin}) AS {origins_alias} FROM {src}",
            op = self.operator.sql_name(),
            src = self.source_table,
            value = self.value_column(),
            meta = meta,
            zone = self.zone_offset_column,
            zone_alias = RESULT_ZONE_OFFSET_COLUMN,
            origin = self.data_origin_column,
            origins_alias = RESULT_DATA_ORIGINS_COLUMN,
        );
        if let Some(join) = &self.join {
            sql.push(' ');
            sql.push_str(&join.to_string());
        }
        sql.push_str(&format!(
            " WHERE {meta}.{time} >= ? AND {meta}.{time} < ?",
            time = self.time_column
        ));
        sql
    }
}

/// Plan for `kind` over `record_type`, or `None` when the pair is unsupported.
pub fn plan_for(record_type: RecordType, kind: AggregationKind) -> Option<AggregationPlan> {
    if kind.record_type() != record_type {
        return None;
    }
    let schema = RecordSchema::for_type(record_type);

    let (source_table, column, join) = match kind {
        AggregationKind::StepsCountTotal => (schema.table(), COUNT_COLUMN, None),
        AggregationKind::ElevationGainedTotal => (schema.table(), ELEVATION_COLUMN, None),
        AggregationKind::HeartRateBpmMax
        | AggregationKind::HeartRateBpmMin
        | AggregationKind::HeartRateBpmAvg => {
            let series_table = schema.series_table()?;
            (
                series_table,
                BEATS_PER_MINUTE_COLUMN,
                Some(SqlJoin {
                    child_table: series_table,
                    parent_table: schema.table(),
                    child_key: PARENT_KEY_COLUMN,
                    parent_key: ROW_ID_COLUMN,
                }),
            )
        }
    };

    Some(AggregationPlan {
        kind,
        operator: kind.operator(),
        source_table,
        value_column: column,
        time_column: START_TIME_COLUMN,
        zone_offset_column: START_ZONE_OFFSET_COLUMN,
        data_origin_column: APP_PACKAGE_COLUMN,
        join,
    })
}

/// Read the aggregate for `plan` off the row under the cursor.
///
/// A NULL aggregate column means no rows contributed and yields an absent
/// value. A NULL zone offset yields `None`, never UTC.
pub fn extract<C: RowCursor + ?Sized>(
    cursor: &C,
    plan: &AggregationPlan,
) -> RepositoryResult<AggregateResult> {
    let row = cursor.row()?;
    let column = plan.value_column();

    let value = match plan.kind.value_kind() {
        ValueKind::Long => row.get_optional_long(column)?.map(AggregateValue::Long),
        ValueKind::Double => row.get_optional_double(column)?.map(AggregateValue::Double),
    };

    let zone_offset = match row.get_optional_int(RESULT_ZONE_OFFSET_COLUMN)? {
        None => None,
        Some(seconds) => Some(ZoneOffset::from_seconds(seconds).ok_or_else(|| {
            RepositoryError::SchemaMismatch {
                column: RESULT_ZONE_OFFSET_COLUMN.to_string(),
                detail: format!("zone offset {seconds}s out of range"),
            }
        })?),
    };

    let data_origins = row
        .get_string_list(RESULT_DATA_ORIGINS_COLUMN)?
        .into_iter()
        .map(DataOrigin::new);

    Ok(AggregateResult {
        value,
        zone_offset,
        data_origins: data_origins.collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::cursor::{MemoryCursor, Row, SqlValue};
    use crate::db::schema::{HEART_RATE_SERIES_TABLE, HEART_RATE_TABLE, STEPS_TABLE};

    fn result_cursor(row: Row) -> MemoryCursor {
        let mut cursor = MemoryCursor::new(vec![row]);
        cursor.move_to_next();
        cursor
    }

    #[test]
    fn test_every_kind_has_a_plan_for_its_record_type() {
        for kind in AggregationKind::ALL {
            let plan = plan_for(kind.record_type(), kind).unwrap();
            assert_eq!(plan.kind, kind);
            assert_eq!(plan.join.is_some(), kind.record_type().is_series());
        }
    }

    #[test]
    fn test_mismatched_pair_is_unsupported() {
        assert!(plan_for(RecordType::Steps, AggregationKind::HeartRateBpmAvg).is_none());
        assert!(plan_for(RecordType::HeartRate, AggregationKind::ElevationGainedTotal).is_none());
    }

    #[test]
    fn test_heart_rate_kinds_read_same_column() {
        let max = plan_for(RecordType::HeartRate, AggregationKind::HeartRateBpmMax).unwrap();
        let avg = plan_for(RecordType::HeartRate, AggregationKind::HeartRateBpmAvg).unwrap();

        assert_eq!(max.value_column(), avg.value_column());
        assert_eq!(max.value_column(), BEATS_PER_MINUTE_COLUMN);
        assert_eq!(max.source_table, HEART_RATE_SERIES_TABLE);
        assert_eq!(max.time_table(), HEART_RATE_TABLE);
        assert_ne!(max.operator, avg.operator);
    }

    #[test]
    fn test_select_sql_includes_join() {
        let plan = plan_for(RecordType::HeartRate, AggregationKind::HeartRateBpmAvg).unwrap();
        let sql = plan.select_sql();

        assert!(sql.starts_with(
            "SELECT AVG(heart_rate_record_series_table.beats_per_minute) AS beats_per_minute"
        ));
        assert!(sql.contains(
            "INNER JOIN heart_rate_record_table ON \
             heart_rate_record_series_table.parent_key = heart_rate_record_table.row_id"
        ));
        assert!(sql.ends_with("WHERE heart_rate_record_table.start_time >= ? AND heart_rate_record_table.start_time < ?"));

        let steps = plan_for(RecordType::Steps, AggregationKind::StepsCountTotal).unwrap();
        assert!(steps.select_sql().contains(&format!("FROM {STEPS_TABLE} WHERE")));
    }

    #[test]
    fn test_extract_elevation_without_zone_offset() {
        let plan = plan_for(RecordType::ElevationGained, AggregationKind::ElevationGainedTotal).unwrap();
        let cursor = result_cursor(
            Row::new()
                .with(ELEVATION_COLUMN, 154.25f64)
                .with(RESULT_ZONE_OFFSET_COLUMN, SqlValue::Null)
                .with(RESULT_DATA_ORIGINS_COLUMN, SqlValue::TextList(vec!["com.hike".into()])),
        );

        let result = extract(&cursor, &plan).unwrap();
        assert_eq!(result.value, Some(AggregateValue::Double(154.25)));
        assert_eq!(result.zone_offset, None);
        assert!(result.data_origins.contains(&DataOrigin::new("com.hike")));
    }

    #[test]
    fn test_extract_null_value_is_absent() {
        let plan = plan_for(RecordType::Steps, AggregationKind::StepsCountTotal).unwrap();
        let cursor = result_cursor(
            Row::new()
                .with(COUNT_COLUMN, SqlValue::Null)
                .with(RESULT_ZONE_OFFSET_COLUMN, SqlValue::Null)
                .with(RESULT_DATA_ORIGINS_COLUMN, SqlValue::TextList(vec![])),
        );

        let result = extract(&cursor, &plan).unwrap();
        assert!(result.is_absent());
        assert!(result.data_origins.is_empty());
    }

    #[test]
    fn test_extract_truncates_average_to_long() {
        let plan = plan_for(RecordType::HeartRate, AggregationKind::HeartRateBpmAvg).unwrap();
        let cursor = result_cursor(
            Row::new()
                .with(BEATS_PER_MINUTE_COLUMN, 72.6f64)
                .with(RESULT_ZONE_OFFSET_COLUMN, 3600i64)
                .with(RESULT_DATA_ORIGINS_COLUMN, SqlValue::TextList(vec!["a".into(), "b".into()])),
        );

        let result = extract(&cursor, &plan).unwrap();
        assert_eq!(result.value, Some(AggregateValue::Long(72)));
        assert_eq!(result.zone_offset, ZoneOffset::from_hours(1));
        assert_eq!(result.data_origins.len(), 2);
    }

    #[test]
    fn test_extract_missing_column_is_schema_mismatch() {
        let plan = plan_for(RecordType::Steps, AggregationKind::StepsCountTotal).unwrap();
        let cursor = result_cursor(Row::new().with(RESULT_ZONE_OFFSET_COLUMN, SqlValue::Null));
        assert!(matches!(
            extract(&cursor, &plan),
            Err(RepositoryError::SchemaMismatch { .. })
        ));
    }
}
