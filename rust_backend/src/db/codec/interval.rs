//! Codec for records stored as exactly one row.

use super::{decode_common, encode_common, EncodedRecord};
use crate::db::cursor::{Row, RowCursor};
use crate::db::repository::{RepositoryError, RepositoryResult};
use crate::db::schema::{RecordSchema, COUNT_COLUMN, ELEVATION_COLUMN};
use crate::models::{Record, RecordPayload, RecordType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalCodec {
    record_type: RecordType,
    table: &'static str,
}

impl IntervalCodec {
    pub fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            table: RecordSchema::for_type(record_type).table(),
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn encode(&self, record: &Record) -> RepositoryResult<EncodedRecord> {
        let mut row = encode_common(record);
        match &record.payload {
            RecordPayload::Steps { count } => row.set(COUNT_COLUMN, *count),
            RecordPayload::ElevationGained { elevation_meters } => {
                row.set(ELEVATION_COLUMN, *elevation_meters)
            }
            RecordPayload::HeartRate { .. } => {
                return Err(RepositoryError::CodecMismatch(
                    "heart rate records use the series layout".to_string(),
                ))
            }
        }

        Ok(EncodedRecord {
            table: self.table,
            row,
            series_table: None,
            series_rows: Vec::new(),
        })
    }

    /// Decode the record under the cursor and step past its row.
    pub fn decode<C: RowCursor + ?Sized>(&self, cursor: &mut C) -> RepositoryResult<Record> {
        let record = {
            let row = cursor.row()?;
            decode_common(row, self.decode_payload(row)?)?
        };
        cursor.move_to_next();
        Ok(record)
    }

    fn decode_payload(&self, row: &Row) -> RepositoryResult<RecordPayload> {
        match self.record_type {
            RecordType::Steps => Ok(RecordPayload::Steps {
                count: row.get_long(COUNT_COLUMN)?,
            }),
            RecordType::ElevationGained => Ok(RecordPayload::ElevationGained {
                elevation_meters: row.get_double(ELEVATION_COLUMN)?,
            }),
            RecordType::HeartRate => Err(RepositoryError::CodecMismatch(
                "heart rate records use the series layout".to_string(),
            )),
        }
    }
}
