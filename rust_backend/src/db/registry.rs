//! Record type registry.
//!
//! The registry is built once at startup and never mutated afterwards. Each
//! registered record type carries its schema descriptor, codec and
//! aggregation plans; every lookup is a single map access. Share it by
//! reference or `Arc`; no synchronization is needed for reads.

use std::collections::HashMap;

use log::debug;

use super::aggregation::{self, AggregationPlan};
use super::codec::RecordCodec;
use super::cursor::RowCursor;
use super::repository::{RepositoryError, RepositoryResult};
use super::schema::{RecordSchema, StorageKind};
use crate::models::{AggregateResult, AggregationKind, RecordType};

/// Everything the storage layer knows about one record type.
#[derive(Debug, Clone)]
pub struct RecordTypeEntry {
    pub schema: RecordSchema,
    pub codec: RecordCodec,
    plans: HashMap<AggregationKind, AggregationPlan>,
}

impl RecordTypeEntry {
    pub fn for_type(record_type: RecordType) -> Self {
        let plans = AggregationKind::ALL
            .into_iter()
            .filter_map(|kind| aggregation::plan_for(record_type, kind).map(|plan| (kind, plan)))
            .collect();

        Self {
            schema: RecordSchema::for_type(record_type),
            codec: RecordCodec::for_type(record_type),
            plans,
        }
    }

    pub fn plan(&self, kind: AggregationKind) -> Option<&AggregationPlan> {
        self.plans.get(&kind)
    }

    pub fn supported_kinds(&self) -> impl Iterator<Item = AggregationKind> + '_ {
        self.plans.keys().copied()
    }
}

/// Immutable registry of record types.
#[derive(Debug, Clone)]
pub struct RecordTypeRegistry {
    entries: HashMap<RecordType, RecordTypeEntry>,
}

impl RecordTypeRegistry {
    /// Registry with every known record type.
    pub fn standard() -> Self {
        RecordType::ALL
            .into_iter()
            .fold(Self::builder(), RegistryBuilder::register)
            .build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn entry(&self, record_type: RecordType) -> RepositoryResult<&RecordTypeEntry> {
        self.entries
            .get(&record_type)
            .ok_or(RepositoryError::Unregistered(record_type))
    }

    pub fn is_registered(&self, record_type: RecordType) -> bool {
        self.entries.contains_key(&record_type)
    }

    pub fn record_types(&self) -> impl Iterator<Item = RecordType> + '_ {
        self.entries.keys().copied()
    }

    /// Ordered `(column, storage kind)` pairs backing `record_type`.
    pub fn columns_for(
        &self,
        record_type: RecordType,
    ) -> RepositoryResult<Vec<(&'static str, StorageKind)>> {
        Ok(self.entry(record_type)?.schema.columns())
    }

    /// Main table name for `record_type`.
    pub fn table_for(&self, record_type: RecordType) -> RepositoryResult<&'static str> {
        Ok(self.entry(record_type)?.schema.table())
    }

    pub fn codec_for(&self, record_type: RecordType) -> RepositoryResult<&RecordCodec> {
        Ok(&self.entry(record_type)?.codec)
    }

    /// Plan for `kind`, or `None` when the type is unregistered or the pair
    /// is unsupported.
    pub fn plan_for(
        &self,
        record_type: RecordType,
        kind: AggregationKind,
    ) -> Option<&AggregationPlan> {
        self.entries.get(&record_type).and_then(|e| e.plan(kind))
    }

    /// Read the result of `kind` off the row under `cursor`.
    pub fn extract<C: RowCursor + ?Sized>(
        &self,
        cursor: &C,
        kind: AggregationKind,
    ) -> RepositoryResult<AggregateResult> {
        let plan = self.plan_for(kind.record_type(), kind).ok_or_else(|| {
            RepositoryError::QueryError(format!("no aggregation plan for {kind}"))
        })?;
        aggregation::extract(cursor, plan)
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: HashMap<RecordType, RecordTypeEntry>,
}

impl RegistryBuilder {
    pub fn register(mut self, record_type: RecordType) -> Self {
        debug!("Registering record type {}", record_type);
        self.entries
            .insert(record_type, RecordTypeEntry::for_type(record_type));
        self
    }

    pub fn build(self) -> RecordTypeRegistry {
        RecordTypeRegistry {
            entries: self.entries,
        }
    }
}
