//! In-memory local repository implementation.
//!
//! Records are stored as rows in named tables exactly as the codecs lay them
//! out: one main-table row per record, plus child rows keyed by `parent_key`
//! for series records. Reads rebuild the joined, parent-ordered result set a
//! relational engine would return and decode it through the registry codecs.

use async_trait::async_trait;
use log::{debug, info};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::db::aggregation::{
    AggregationPlan, RESULT_DATA_ORIGINS_COLUMN, RESULT_ZONE_OFFSET_COLUMN,
};
use crate::db::cursor::{MemoryCursor, Row, SqlValue};
use crate::db::registry::{RecordTypeEntry, RecordTypeRegistry};
use crate::db::repo_config::ReadSettings;
use crate::db::repository::*;
use crate::db::schema::{
    APP_PACKAGE_COLUMN, EPOCH_MILLIS_COLUMN, PARENT_KEY_COLUMN, ROW_ID_COLUMN,
    START_TIME_COLUMN, UUID_COLUMN,
};
use crate::models::{
    AggregateOperator, DataOrigin, ReadRecordsRequest, ReadRecordsResponse, Record, TimeWindow,
    ZoneOffset,
};

/// In-memory local repository.
///
/// Suitable for unit tests, local development and the command-line tool.
/// Cloning shares the underlying tables.
///
/// # Example
/// ```ignore
/// let repo = LocalRepository::new();
/// repo.insert_records(&records).await?;
/// let page = repo.read_records(&request).await?;
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
    registry: Arc<RecordTypeRegistry>,
    read: ReadSettings,
    zone_offset: ZoneOffset,
}

struct LocalData {
    tables: HashMap<&'static str, Vec<Row>>,
    next_row_id: i64,
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            tables: HashMap::new(),
            next_row_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalData {
    fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    fn allocate_row_id(&mut self) -> i64 {
        let id = self.next_row_id;
        self.next_row_id += 1;
        id
    }

    fn contains_uuid(&self, uuid: &str) -> bool {
        self.tables.values().flatten().any(|row| {
            matches!(row.get(UUID_COLUMN), Some(SqlValue::Text(existing)) if existing == uuid)
        })
    }
}

impl LocalRepository {
    /// Create an empty repository over the standard record types.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(RecordTypeRegistry::standard()))
    }

    /// Create an empty repository over the given registry.
    pub fn with_registry(registry: Arc<RecordTypeRegistry>) -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
            registry,
            read: ReadSettings::default(),
            zone_offset: ZoneOffset::UTC,
        }
    }

    /// Override the paging limits of the read path.
    pub fn with_read_settings(mut self, read: ReadSettings) -> Self {
        self.read = read;
        self
    }

    /// Zone used to resolve local time ranges on the read path.
    pub fn with_zone_offset(mut self, zone_offset: ZoneOffset) -> Self {
        self.zone_offset = zone_offset;
        self
    }

    pub fn registry(&self) -> &Arc<RecordTypeRegistry> {
        &self.registry
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) -> RepositoryResult<()> {
        self.write_data()?.is_healthy = healthy;
        Ok(())
    }

    /// Clear all data from the repository.
    pub fn clear(&self) -> RepositoryResult<()> {
        let mut data = self.write_data()?;
        *data = LocalData {
            is_healthy: data.is_healthy,
            ..Default::default()
        };
        Ok(())
    }

    /// Number of rows stored in `table`.
    pub fn row_count(&self, table: &str) -> RepositoryResult<usize> {
        Ok(self.read_data()?.rows(table).len())
    }

    fn read_data(&self) -> RepositoryResult<RwLockReadGuard<'_, LocalData>> {
        self.data
            .read()
            .map_err(|_| RepositoryError::InternalError("local store lock poisoned".to_string()))
    }

    fn write_data(&self) -> RepositoryResult<RwLockWriteGuard<'_, LocalData>> {
        self.data
            .write()
            .map_err(|_| RepositoryError::InternalError("local store lock poisoned".to_string()))
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(&self) -> RepositoryResult<()> {
        if !self.read_data()?.is_healthy {
            return Err(RepositoryError::ConnectionError(
                "Local store is not healthy".to_string(),
            ));
        }
        Ok(())
    }

    /// Join `parents` with their child rows (if any) and decode the result.
    ///
    /// Child rows are emitted contiguously per parent in sample time order.
    fn decode_rows(
        &self,
        data: &LocalData,
        entry: &RecordTypeEntry,
        parents: &[&Row],
    ) -> RepositoryResult<Vec<Record>> {
        let rows = match entry.schema.series_table() {
            None => parents.iter().map(|row| (*row).clone()).collect(),
            Some(series_table) => {
                let mut children_by_parent: HashMap<i64, Vec<(i64, &Row)>> = HashMap::new();
                for child in data.rows(series_table) {
                    children_by_parent
                        .entry(child.get_long(PARENT_KEY_COLUMN)?)
                        .or_default()
                        .push((child.get_long(EPOCH_MILLIS_COLUMN)?, child));
                }

                let mut joined = Vec::new();
                for parent in parents {
                    let key = parent.get_long(ROW_ID_COLUMN)?;
                    let Some(children) = children_by_parent.get_mut(&key) else {
                        continue;
                    };
                    children.sort_by_key(|(epoch_millis, _)| *epoch_millis);
                    for (_, child) in children.iter() {
                        let mut row = (*parent).clone();
                        row.merge(child);
                        joined.push(row);
                    }
                }
                joined
            }
        };

        let mut cursor = MemoryCursor::new(rows);
        entry.codec.decode_all(&mut cursor)
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

/// Main-table rows sorted by `(time column, row_id)`.
fn ordered_parents<'a>(
    rows: &'a [Row],
    time_column: &str,
    mut keep: impl FnMut(&Row, i64) -> RepositoryResult<bool>,
) -> RepositoryResult<Vec<&'a Row>> {
    let mut matched = Vec::new();
    for row in rows {
        let time = row.get_long(time_column)?;
        if keep(row, time)? {
            matched.push((time, row.get_long(ROW_ID_COLUMN)?, row));
        }
    }
    matched.sort_by_key(|(time, row_id, _)| (*time, *row_id));
    Ok(matched.into_iter().map(|(_, _, row)| row).collect())
}

fn origin_filter(origins: &[DataOrigin]) -> HashSet<&str> {
    origins.iter().map(DataOrigin::package_name).collect()
}

fn numeric(value: &SqlValue) -> RepositoryResult<f64> {
    value.as_f64().ok_or_else(|| {
        RepositoryError::QueryError(format!("cannot aggregate non-numeric value {:?}", value))
    })
}

/// Fold non-null values with `operator` the way a relational engine does:
/// SUM/MIN/MAX keep integer results for integer input, AVG is always real.
fn fold_values(operator: AggregateOperator, values: &[&SqlValue]) -> RepositoryResult<SqlValue> {
    let Some((first, rest)) = values.split_first() else {
        return Ok(SqlValue::Null);
    };
    let all_integer = values.iter().all(|v| matches!(v, SqlValue::Integer(_)));

    match operator {
        AggregateOperator::Sum if all_integer => values
            .iter()
            .try_fold(0i64, |acc, v| match v {
                SqlValue::Integer(i) => acc.checked_add(*i),
                _ => None,
            })
            .map(SqlValue::Integer)
            .ok_or_else(|| RepositoryError::QueryError("integer overflow in SUM".to_string())),
        AggregateOperator::Sum => {
            let mut total = 0.0;
            for v in values {
                total += numeric(v)?;
            }
            Ok(SqlValue::Real(total))
        }
        AggregateOperator::Avg => {
            let mut total = 0.0;
            for v in values {
                total += numeric(v)?;
            }
            Ok(SqlValue::Real(total / values.len() as f64))
        }
        AggregateOperator::Min | AggregateOperator::Max => {
            let mut best = *first;
            for &v in rest {
                let (candidate, current) = (numeric(v)?, numeric(best)?);
                let better = match operator {
                    AggregateOperator::Min => candidate < current,
                    _ => candidate > current,
                };
                if better {
                    best = v;
                }
            }
            Ok(best.clone())
        }
    }
}

#[async_trait]
impl RecordRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.read_data()?.is_healthy)
    }

    async fn insert_records(&self, records: &[Record]) -> RepositoryResult<Vec<Uuid>> {
        self.check_health()?;

        let mut encoded = Vec::with_capacity(records.len());
        for record in records {
            if record.end_time < record.start_time {
                return Err(RepositoryError::ValidationError(format!(
                    "record {} ends before it starts",
                    record.uuid
                )));
            }
            let codec = self.registry.codec_for(record.record_type())?;
            encoded.push(codec.encode(record)?);
        }

        let mut data = self.write_data()?;
        let mut batch = HashSet::new();
        for record in records {
            if !batch.insert(record.uuid) || data.contains_uuid(&record.uuid.to_string()) {
                return Err(RepositoryError::ValidationError(format!(
                    "duplicate record uuid {}",
                    record.uuid
                )));
            }
        }

        for mut encoded_record in encoded {
            let row_id = data.allocate_row_id();
            encoded_record.row.set(ROW_ID_COLUMN, row_id);
            data.tables
                .entry(encoded_record.table)
                .or_default()
                .push(encoded_record.row);

            if let Some(series_table) = encoded_record.series_table {
                data.tables.entry(series_table).or_default().extend(
                    encoded_record
                        .series_rows
                        .into_iter()
                        .map(|child| child.with(PARENT_KEY_COLUMN, row_id)),
                );
            }
        }

        info!("Stored {} records", records.len());
        Ok(records.iter().map(|record| record.uuid).collect())
    }

    async fn read_records(
        &self,
        request: &ReadRecordsRequest,
    ) -> RepositoryResult<ReadRecordsResponse> {
        self.check_health()?;
        let entry = self.registry.entry(request.record_type())?;
        let data = self.read_data()?;
        let parents = data.rows(entry.schema.table());

        match request {
            ReadRecordsRequest::Filters(filter) => {
                let page_size = filter.page_size.unwrap_or(self.read.default_page_size);
                if page_size == 0 || page_size > self.read.max_page_size {
                    return Err(RepositoryError::ValidationError(format!(
                        "page size {} outside 1..={}",
                        page_size, self.read.max_page_size
                    )));
                }
                let offset = usize::try_from(filter.page_token.unwrap_or(0)).map_err(|_| {
                    RepositoryError::ValidationError("page token out of range".to_string())
                })?;

                let window = filter
                    .time_range
                    .map(|range| {
                        range.window(self.zone_offset).ok_or_else(|| {
                            RepositoryError::ValidationError(
                                "time range is outside the representable range".to_string(),
                            )
                        })
                    })
                    .transpose()?;
                let origins = origin_filter(&filter.data_origins);

                let mut matched = ordered_parents(parents, START_TIME_COLUMN, |row, start| {
                    if window.is_some_and(|w| !w.contains(start)) {
                        return Ok(false);
                    }
                    Ok(origins.is_empty() || origins.contains(row.get_string(APP_PACKAGE_COLUMN)?))
                })?;
                if !filter.ascending {
                    matched.reverse();
                }

                let total = matched.len();
                let page: Vec<&Row> = matched.into_iter().skip(offset).take(page_size).collect();
                let next_page_token = offset
                    .checked_add(page_size)
                    .filter(|end| *end < total)
                    .map(|end| end as u64);

                debug!(
                    "Read {} of {} {} records from offset {}",
                    page.len(),
                    total,
                    request.record_type(),
                    offset
                );
                Ok(ReadRecordsResponse {
                    records: self.decode_rows(&data, entry, &page)?,
                    next_page_token,
                })
            }
            ReadRecordsRequest::Ids { ids, .. } => {
                let wanted: HashSet<String> = ids.iter().map(Uuid::to_string).collect();
                let matched = ordered_parents(parents, START_TIME_COLUMN, |row, _| {
                    Ok(wanted.contains(row.get_string(UUID_COLUMN)?))
                })?;

                Ok(ReadRecordsResponse {
                    records: self.decode_rows(&data, entry, &matched)?,
                    next_page_token: None,
                })
            }
        }
    }
}

#[async_trait]
impl AggregationRepository for LocalRepository {
    async fn aggregate_window(
        &self,
        plan: &AggregationPlan,
        window: TimeWindow,
        data_origins: &[DataOrigin],
    ) -> RepositoryResult<MemoryCursor> {
        self.check_health()?;
        debug!(
            "Aggregating {} over [{}, {}): {}",
            plan.kind,
            window.start,
            window.end,
            plan.select_sql()
        );

        let data = self.read_data()?;
        let origins = origin_filter(data_origins);
        let parents = ordered_parents(data.rows(plan.time_table()), plan.time_column, |row, time| {
            Ok(window.contains(time)
                && (origins.is_empty()
                    || origins.contains(row.get_string(plan.data_origin_column)?)))
        })?;

        // (aggregated cell, parent row owning the time and origin columns)
        let mut contributions: Vec<(&SqlValue, &Row)> = Vec::new();
        match &plan.join {
            None => {
                for &parent in &parents {
                    contributions.push((parent.value(plan.value_column())?, parent));
                }
            }
            Some(join) => {
                let mut children: HashMap<i64, Vec<&Row>> = HashMap::new();
                for child in data.rows(join.child_table) {
                    children
                        .entry(child.get_long(join.child_key)?)
                        .or_default()
                        .push(child);
                }
                for &parent in &parents {
                    let key = parent.get_long(join.parent_key)?;
                    for child in children.get(&key).into_iter().flatten() {
                        contributions.push((child.value(plan.value_column())?, parent));
                    }
                }
            }
        }
        contributions.retain(|(value, _)| !value.is_null());

        let values: Vec<&SqlValue> = contributions.iter().map(|(value, _)| *value).collect();
        let aggregate = fold_values(plan.operator, &values)?;

        let zone_offset = match contributions.first() {
            Some((_, parent)) => parent.value(plan.zone_offset_column)?.clone(),
            None => SqlValue::Null,
        };

        let mut packages = BTreeSet::new();
        for (_, parent) in &contributions {
            packages.insert(parent.get_string(plan.data_origin_column)?.to_string());
        }

        let row = Row::new()
            .with(plan.value_column(), aggregate)
            .with(RESULT_ZONE_OFFSET_COLUMN, zone_offset)
            .with(
                RESULT_DATA_ORIGINS_COLUMN,
                SqlValue::TextList(packages.into_iter().collect()),
            );
        Ok(MemoryCursor::new(vec![row]))
    }
}
