//! Record codecs: typed records to rows and back.
//!
//! Two layouts exist. [`IntervalCodec`] maps one record to one row of its
//! main table. [`SeriesCodec`] maps one record to a parent row plus one child
//! row per sample. Both decode from a cursor positioned on the record's first
//! row and leave the cursor on the first row of the next record (or past the
//! end), so a result set is decoded with:
//!
//! ```ignore
//! cursor.move_to_next();
//! while cursor.current().is_some() {
//!     records.push(codec.decode(&mut cursor)?);
//! }
//! ```

mod interval;
mod series;

pub use interval::IntervalCodec;
pub use series::SeriesCodec;

use uuid::Uuid;

use super::cursor::{Row, RowCursor};
use super::repository::{RepositoryError, RepositoryResult};
use super::schema::{
    APP_PACKAGE_COLUMN, END_TIME_COLUMN, END_ZONE_OFFSET_COLUMN, START_TIME_COLUMN,
    START_ZONE_OFFSET_COLUMN, UUID_COLUMN,
};
use crate::models::time::instant_from_millis;
use crate::models::{DataOrigin, Record, RecordPayload, RecordType, ZoneOffset};

/// Rows produced by encoding one record.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRecord {
    pub table: &'static str,
    pub row: Row,
    /// Child table and rows for series layouts; empty for interval layouts.
    pub series_table: Option<&'static str>,
    pub series_rows: Vec<Row>,
}

/// Codec variant for one record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCodec {
    Interval(IntervalCodec),
    Series(SeriesCodec),
}

impl RecordCodec {
    pub fn for_type(record_type: RecordType) -> Self {
        match record_type {
            RecordType::Steps | RecordType::ElevationGained => {
                RecordCodec::Interval(IntervalCodec::new(record_type))
            }
            RecordType::HeartRate => RecordCodec::Series(SeriesCodec::new(record_type)),
        }
    }

    pub fn record_type(&self) -> RecordType {
        match self {
            RecordCodec::Interval(codec) => codec.record_type(),
            RecordCodec::Series(codec) => codec.record_type(),
        }
    }

    pub fn encode(&self, record: &Record) -> RepositoryResult<EncodedRecord> {
        if record.record_type() != self.record_type() {
            return Err(RepositoryError::CodecMismatch(format!(
                "{} record passed to {} codec",
                record.record_type(),
                self.record_type()
            )));
        }
        match self {
            RecordCodec::Interval(codec) => codec.encode(record),
            RecordCodec::Series(codec) => codec.encode(record),
        }
    }

    pub fn decode<C: RowCursor + ?Sized>(&self, cursor: &mut C) -> RepositoryResult<Record> {
        match self {
            RecordCodec::Interval(codec) => codec.decode(cursor),
            RecordCodec::Series(codec) => codec.decode(cursor),
        }
    }

    /// Decode every record from a cursor positioned before its first row.
    pub fn decode_all<C: RowCursor + ?Sized>(&self, cursor: &mut C) -> RepositoryResult<Vec<Record>> {
        let mut records = Vec::new();
        cursor.move_to_next();
        while cursor.current().is_some() {
            records.push(self.decode(cursor)?);
        }
        Ok(records)
    }
}

/// Cells shared by every main-table row.
fn encode_common(record: &Record) -> Row {
    Row::new()
        .with(UUID_COLUMN, record.uuid.to_string())
        .with(APP_PACKAGE_COLUMN, record.data_origin.package_name())
        .with(START_TIME_COLUMN, record.start_time.timestamp_millis())
        .with(
            START_ZONE_OFFSET_COLUMN,
            record.start_zone_offset.map(|z| i64::from(z.total_seconds())),
        )
        .with(END_TIME_COLUMN, record.end_time.timestamp_millis())
        .with(
            END_ZONE_OFFSET_COLUMN,
            record.end_zone_offset.map(|z| i64::from(z.total_seconds())),
        )
}

fn decode_zone_offset(row: &Row, column: &str) -> RepositoryResult<Option<ZoneOffset>> {
    match row.get_optional_int(column)? {
        None => Ok(None),
        Some(seconds) => ZoneOffset::from_seconds(seconds)
            .map(Some)
            .ok_or_else(|| RepositoryError::SchemaMismatch {
                column: column.to_string(),
                detail: format!("zone offset {seconds}s out of range"),
            }),
    }
}

fn decode_instant(row: &Row, column: &str) -> RepositoryResult<chrono::DateTime<chrono::Utc>> {
    let millis = row.get_long(column)?;
    instant_from_millis(millis).ok_or_else(|| RepositoryError::SchemaMismatch {
        column: column.to_string(),
        detail: format!("timestamp {millis} out of range"),
    })
}

/// Rebuild a record from the shared main-table cells of `row`.
fn decode_common(row: &Row, payload: RecordPayload) -> RepositoryResult<Record> {
    let raw_uuid = row.get_string(UUID_COLUMN)?;
    let uuid = Uuid::parse_str(raw_uuid).map_err(|e| RepositoryError::SchemaMismatch {
        column: UUID_COLUMN.to_string(),
        detail: e.to_string(),
    })?;

    Ok(Record {
        uuid,
        data_origin: DataOrigin::new(row.get_string(APP_PACKAGE_COLUMN)?),
        start_time: decode_instant(row, START_TIME_COLUMN)?,
        start_zone_offset: decode_zone_offset(row, START_ZONE_OFFSET_COLUMN)?,
        end_time: decode_instant(row, END_TIME_COLUMN)?,
        end_zone_offset: decode_zone_offset(row, END_ZONE_OFFSET_COLUMN)?,
        payload,
    })
}
