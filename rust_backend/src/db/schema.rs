//! Column schema descriptors.
//!
//! Every record type declares the ordered `(column, storage kind)` pairs of
//! the table(s) backing it. Interval types own one main table; series types
//! add a child table of samples keyed by the parent's `row_id`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::RecordType;

pub const ROW_ID_COLUMN: &str = "row_id";
pub const UUID_COLUMN: &str = "uuid";
pub const APP_PACKAGE_COLUMN: &str = "app_package";
pub const START_TIME_COLUMN: &str = "start_time";
pub const START_ZONE_OFFSET_COLUMN: &str = "start_zone_offset";
pub const END_TIME_COLUMN: &str = "end_time";
pub const END_ZONE_OFFSET_COLUMN: &str = "end_zone_offset";
pub const PARENT_KEY_COLUMN: &str = "parent_key";

pub const STEPS_TABLE: &str = "steps_record_table";
pub const COUNT_COLUMN: &str = "count";

pub const ELEVATION_GAINED_TABLE: &str = "elevation_gained_record_table";
pub const ELEVATION_COLUMN: &str = "elevation";

pub const HEART_RATE_TABLE: &str = "heart_rate_record_table";
pub const HEART_RATE_SERIES_TABLE: &str = "heart_rate_record_series_table";
pub const BEATS_PER_MINUTE_COLUMN: &str = "beats_per_minute";
pub const EPOCH_MILLIS_COLUMN: &str = "epoch_millis";

/// Physical storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageKind {
    Integer,
    Real,
    Text,
    Blob,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageKind::Integer => "INTEGER",
            StorageKind::Real => "REAL",
            StorageKind::Text => "TEXT",
            StorageKind::Blob => "BLOB",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: &'static str,
    pub kind: StorageKind,
}

const fn column(name: &'static str, kind: StorageKind) -> ColumnDescriptor {
    ColumnDescriptor { name, kind }
}

/// Columns shared by every record's main table, in declaration order.
const INTERVAL_COLUMNS: [ColumnDescriptor; 6] = [
    column(UUID_COLUMN, StorageKind::Text),
    column(APP_PACKAGE_COLUMN, StorageKind::Text),
    column(START_TIME_COLUMN, StorageKind::Integer),
    column(START_ZONE_OFFSET_COLUMN, StorageKind::Integer),
    column(END_TIME_COLUMN, StorageKind::Integer),
    column(END_ZONE_OFFSET_COLUMN, StorageKind::Integer),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Physical layout of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    pub record_type: RecordType,
    pub main: TableSchema,
    pub series: Option<TableSchema>,
}

impl RecordSchema {
    /// Layout of `record_type`.
    pub fn for_type(record_type: RecordType) -> Self {
        match record_type {
            RecordType::Steps => {
                Self::interval(record_type, STEPS_TABLE, &[column(COUNT_COLUMN, StorageKind::Integer)])
            }
            RecordType::ElevationGained => Self::interval(
                record_type,
                ELEVATION_GAINED_TABLE,
                &[column(ELEVATION_COLUMN, StorageKind::Real)],
            ),
            RecordType::HeartRate => Self {
                record_type,
                main: Self::main_table(HEART_RATE_TABLE, &[]),
                series: Some(TableSchema {
                    name: HEART_RATE_SERIES_TABLE,
                    columns: vec![
                        column(BEATS_PER_MINUTE_COLUMN, StorageKind::Integer),
                        column(EPOCH_MILLIS_COLUMN, StorageKind::Integer),
                    ],
                }),
            },
        }
    }

    fn interval(
        record_type: RecordType,
        table: &'static str,
        specific: &[ColumnDescriptor],
    ) -> Self {
        Self {
            record_type,
            main: Self::main_table(table, specific),
            series: None,
        }
    }

    fn main_table(name: &'static str, specific: &[ColumnDescriptor]) -> TableSchema {
        let mut columns = INTERVAL_COLUMNS.to_vec();
        columns.extend_from_slice(specific);
        TableSchema { name, columns }
    }

    /// Name of the table holding one row per record.
    pub fn table(&self) -> &'static str {
        self.main.name
    }

    pub fn series_table(&self) -> Option<&'static str> {
        self.series.as_ref().map(|s| s.name)
    }

    /// All declared columns, main table first, then the series table.
    pub fn columns(&self) -> Vec<(&'static str, StorageKind)> {
        self.main
            .columns
            .iter()
            .chain(self.series.iter().flat_map(|s| s.columns.iter()))
            .map(|c| (c.name, c.kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_schema_columns_in_order() {
        let schema = RecordSchema::for_type(RecordType::ElevationGained);
        let columns = schema.columns();

        assert_eq!(schema.table(), ELEVATION_GAINED_TABLE);
        assert!(schema.series_table().is_none());
        assert_eq!(columns.first(), Some(&(UUID_COLUMN, StorageKind::Text)));
        assert_eq!(columns.last(), Some(&(ELEVATION_COLUMN, StorageKind::Real)));
        assert_eq!(columns.len(), INTERVAL_COLUMNS.len() + 1);
    }

    #[test]
    fn test_series_schema_appends_child_columns() {
        let schema = RecordSchema::for_type(RecordType::HeartRate);
        let columns = schema.columns();

        assert_eq!(schema.series_table(), Some(HEART_RATE_SERIES_TABLE));
        assert_eq!(
            &columns[columns.len() - 2..],
            &[
                (BEATS_PER_MINUTE_COLUMN, StorageKind::Integer),
                (EPOCH_MILLIS_COLUMN, StorageKind::Integer)
            ]
        );
    }

    #[test]
    fn test_every_type_has_a_schema() {
        for record_type in RecordType::ALL {
            let schema = RecordSchema::for_type(record_type);
            assert_eq!(schema.record_type, record_type);
            assert_eq!(schema.series.is_some(), record_type.is_series());
            assert!(schema.main.column(START_TIME_COLUMN).is_some());
        }
    }

    #[test]
    fn test_storage_kind_display() {
        assert_eq!(StorageKind::Integer.to_string(), "INTEGER");
        assert_eq!(StorageKind::Blob.to_string(), "BLOB");
    }
}
