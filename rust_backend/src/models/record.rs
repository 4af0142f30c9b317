//! Typed health records.
//!
//! A [`Record`] carries the metadata shared by every record type (identity,
//! source package, start/end instants and their zone offsets) plus a
//! type-specific [`RecordPayload`]. The payload variant determines the
//! [`RecordType`], so the two can never disagree.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::time::ZoneOffset;

/// Identifier of every record type known to the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    Steps,
    HeartRate,
    ElevationGained,
}

impl RecordType {
    pub const ALL: [RecordType; 3] = [
        RecordType::Steps,
        RecordType::HeartRate,
        RecordType::ElevationGained,
    ];

    /// Stable numeric identifier used on the wire.
    pub fn id(self) -> i32 {
        match self {
            RecordType::Steps => 1,
            RecordType::HeartRate => 2,
            RecordType::ElevationGained => 4,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    /// Whether records of this type keep their samples in a child table.
    pub fn is_series(self) -> bool {
        matches!(self, RecordType::HeartRate)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordType::Steps => "Steps",
            RecordType::HeartRate => "HeartRate",
            RecordType::ElevationGained => "ElevationGained",
        };
        f.write_str(name)
    }
}

/// Package name of the application that contributed a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataOrigin(String);

impl DataOrigin {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self(package_name.into())
    }

    pub fn package_name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DataOrigin {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One heart-rate measurement inside a series record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub beats_per_minute: i64,
    pub epoch_millis: i64,
}

impl HeartRateSample {
    pub fn new(beats_per_minute: i64, epoch_millis: i64) -> Self {
        Self {
            beats_per_minute,
            epoch_millis,
        }
    }
}

/// Type-specific part of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordPayload {
    Steps { count: i64 },
    ElevationGained { elevation_meters: f64 },
    HeartRate { samples: Vec<HeartRateSample> },
}

impl RecordPayload {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordPayload::Steps { .. } => RecordType::Steps,
            RecordPayload::ElevationGained { .. } => RecordType::ElevationGained,
            RecordPayload::HeartRate { .. } => RecordType::HeartRate,
        }
    }
}

/// A typed, time-stamped health observation.
///
/// Instants are stored with millisecond precision; anything finer is lost
/// when the record is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default = "Uuid::new_v4")]
    pub uuid: Uuid,
    pub data_origin: DataOrigin,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub start_zone_offset: Option<ZoneOffset>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub end_zone_offset: Option<ZoneOffset>,
    pub payload: RecordPayload,
}

impl Record {
    /// Create a record with a fresh random uuid and no zone offsets.
    pub fn new(
        data_origin: DataOrigin,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        payload: RecordPayload,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            data_origin,
            start_time,
            start_zone_offset: None,
            end_time,
            end_zone_offset: None,
            payload,
        }
    }

    /// Set both start and end zone offsets.
    pub fn with_zone_offset(mut self, offset: ZoneOffset) -> Self {
        self.start_zone_offset = Some(offset);
        self.end_zone_offset = Some(offset);
        self
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = uuid;
        self
    }

    pub fn record_type(&self) -> RecordType {
        self.payload.record_type()
    }
}
