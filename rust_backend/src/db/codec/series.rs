//! Codec for records stored as a parent row plus child sample rows.
//!
//! On read, each child row arrives joined with its parent's cells, and all
//! rows of one record must be contiguous and ordered by sample time. Decoding
//! peeks at the next row's `parent_key` to find where the record ends rather
//! than reading past it and stepping back.

use super::{decode_common, encode_common, EncodedRecord};
use crate::db::cursor::{Row, RowCursor};
use crate::db::repository::{RepositoryError, RepositoryResult};
use crate::db::schema::{
    RecordSchema, BEATS_PER_MINUTE_COLUMN, EPOCH_MILLIS_COLUMN, PARENT_KEY_COLUMN,
};
use crate::models::{HeartRateSample, Record, RecordPayload, RecordType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesCodec {
    record_type: RecordType,
    table: &'static str,
    series_table: &'static str,
}

impl SeriesCodec {
    pub fn new(record_type: RecordType) -> Self {
        let schema = RecordSchema::for_type(record_type);
        Self {
            record_type,
            table: schema.table(),
            series_table: schema.series_table().unwrap_or(schema.table()),
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Encode the parent row and one child row per sample. The child rows
    /// carry no `parent_key`; the store assigns it on insert.
    pub fn encode(&self, record: &Record) -> RepositoryResult<EncodedRecord> {
        let samples = match &record.payload {
            RecordPayload::HeartRate { samples } => samples,
            other => {
                return Err(RepositoryError::CodecMismatch(format!(
                    "{} records use the interval layout",
                    other.record_type()
                )))
            }
        };
        if samples.is_empty() {
            return Err(RepositoryError::ValidationError(
                "series record requires at least one sample".to_string(),
            ));
        }

        let series_rows = samples
            .iter()
            .map(|sample| {
                Row::new()
                    .with(BEATS_PER_MINUTE_COLUMN, sample.beats_per_minute)
                    .with(EPOCH_MILLIS_COLUMN, sample.epoch_millis)
            })
            .collect();

        Ok(EncodedRecord {
            table: self.table,
            row: encode_common(record),
            series_table: Some(self.series_table),
            series_rows,
        })
    }

    /// Decode one record starting at its first joined row.
    ///
    /// Consumes every contiguous row sharing the current `parent_key` and
    /// leaves the cursor on the first row of the next parent, or past the end.
    pub fn decode<C: RowCursor + ?Sized>(&self, cursor: &mut C) -> RepositoryResult<Record> {
        let (parent_key, mut record) = {
            let row = cursor.row()?;
            let key = row.get_long(PARENT_KEY_COLUMN)?;
            let record = decode_common(row, RecordPayload::HeartRate { samples: Vec::new() })?;
            (key, record)
        };

        let mut samples = Vec::new();
        loop {
            samples.push(self.decode_sample(cursor.row()?)?);
            let same_parent = match cursor.peek_next() {
                Some(next) => next.get_long(PARENT_KEY_COLUMN)? == parent_key,
                None => false,
            };
            cursor.move_to_next();
            if !same_parent {
                break;
            }
        }

        record.payload = RecordPayload::HeartRate { samples };
        Ok(record)
    }

    fn decode_sample(&self, row: &Row) -> RepositoryResult<HeartRateSample> {
        Ok(HeartRateSample::new(
            row.get_long(BEATS_PER_MINUTE_COLUMN)?,
            row.get_long(EPOCH_MILLIS_COLUMN)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::cursor::MemoryCursor;
    use crate::db::schema::HEART_RATE_SERIES_TABLE;
    use crate::models::DataOrigin;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    const T0: i64 = 1_672_531_200_000;

    fn heart_rate(samples: Vec<HeartRateSample>) -> Record {
        Record::new(
            DataOrigin::new("com.example.watch"),
            Utc.timestamp_millis_opt(T0).unwrap(),
            Utc.timestamp_millis_opt(T0 + 60_000).unwrap(),
            RecordPayload::HeartRate { samples },
        )
    }

    /// Joined rows as the store returns them: parent cells merged into each child.
    fn joined_rows(encoded: &EncodedRecord, parent_key: i64) -> Vec<Row> {
        encoded
            .series_rows
            .iter()
            .map(|child| {
                let mut row = encoded.row.clone();
                row.merge(child);
                row.set(PARENT_KEY_COLUMN, parent_key);
                row
            })
            .collect()
    }

    #[test]
    fn test_heart_rate_samples_round_trip_in_order() {
        let codec = SeriesCodec::new(RecordType::HeartRate);
        let samples = vec![
            HeartRateSample::new(72, T0),
            HeartRateSample::new(75, T0 + 1000),
            HeartRateSample::new(70, T0 + 2000),
        ];
        let record = heart_rate(samples.clone());

        let encoded = codec.encode(&record).unwrap();
        assert_eq!(encoded.series_table, Some(HEART_RATE_SERIES_TABLE));
        assert_eq!(encoded.series_rows.len(), 3);

        let mut cursor = MemoryCursor::new(joined_rows(&encoded, 1));
        cursor.move_to_next();
        let decoded = codec.decode(&mut cursor).unwrap();

        assert_eq!(decoded.payload, RecordPayload::HeartRate { samples });
        assert_eq!(decoded, record);
        assert!(cursor.is_after_last());
        assert_eq!(codec.encode(&decoded).unwrap(), encoded);
    }

    #[test]
    fn test_decode_stops_at_next_parent() {
        let codec = SeriesCodec::new(RecordType::HeartRate);
        let first = heart_rate(vec![HeartRateSample::new(60, T0), HeartRateSample::new(61, T0 + 1)]);
        let second = heart_rate(vec![HeartRateSample::new(90, T0 + 5)]);

        let mut rows = joined_rows(&codec.encode(&first).unwrap(), 1);
        rows.extend(joined_rows(&codec.encode(&second).unwrap(), 2));
        let mut cursor = MemoryCursor::new(rows);
        cursor.move_to_next();

        let decoded = codec.decode(&mut cursor).unwrap();
        assert_eq!(decoded.uuid, first.uuid);
        assert_eq!(cursor.position(), Some(2));
        assert_eq!(cursor.get_long(PARENT_KEY_COLUMN).unwrap(), 2);

        let decoded = codec.decode(&mut cursor).unwrap();
        assert_eq!(decoded.uuid, second.uuid);
        assert!(cursor.is_after_last());
    }

    #[test]
    fn test_encode_rejects_empty_series() {
        let codec = SeriesCodec::new(RecordType::HeartRate);
        let err = codec.encode(&heart_rate(vec![])).unwrap_err();
        assert!(matches!(err, RepositoryError::ValidationError(_)));
    }

    #[test]
    fn test_decode_without_parent_key_is_schema_mismatch() {
        let codec = SeriesCodec::new(RecordType::HeartRate);
        let encoded = codec.encode(&heart_rate(vec![HeartRateSample::new(60, T0)])).unwrap();
        let mut row = encoded.row.clone();
        row.merge(&encoded.series_rows[0]);

        let mut cursor = MemoryCursor::new(vec![row]);
        cursor.move_to_next();
        assert!(matches!(
            codec.decode(&mut cursor),
            Err(RepositoryError::SchemaMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_decode_consumes_exactly_one_block(
            first_len in 1usize..20,
            second_len in 0usize..20,
        ) {
            let codec = SeriesCodec::new(RecordType::HeartRate);
            let samples = |n: usize, bpm: i64| -> Vec<HeartRateSample> {
                (0..n).map(|i| HeartRateSample::new(bpm, T0 + i as i64)).collect()
            };

            let mut rows = joined_rows(&codec.encode(&heart_rate(samples(first_len, 60))).unwrap(), 7);
            if second_len > 0 {
                rows.extend(joined_rows(&codec.encode(&heart_rate(samples(second_len, 80))).unwrap(), 8));
            }
            let mut cursor = MemoryCursor::new(rows);
            cursor.move_to_next();

            let decoded = codec.decode(&mut cursor).unwrap();
            match decoded.payload {
                RecordPayload::HeartRate { samples } => prop_assert_eq!(samples.len(), first_len),
                other => prop_assert!(false, "unexpected payload {:?}", other),
            }
            prop_assert_eq!(cursor.position(), Some(first_len));
            if second_len == 0 {
                prop_assert!(cursor.is_after_last());
            } else {
                prop_assert_eq!(cursor.get_long(PARENT_KEY_COLUMN).unwrap(), 8);
            }
        }
    }
}
