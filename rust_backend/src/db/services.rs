//! High-level service layer.
//!
//! Repository-agnostic operations that work with any implementation of the
//! repository traits. Aggregation requests are resolved here: each requested
//! kind is mapped to its plan through the registry, the time range is split
//! into bucket windows, one query runs per kind per window, and the results
//! are handed to the response assembler.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (CLI, transport adapters)            │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs)                            │
//! │  - Request validation                                   │
//! │  - Bucket windows and response assembly                 │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository/)                        │
//! │  - RecordRepository (insert, read)                      │
//! │  - AggregationRepository (plan execution)               │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!         ┌───────────▼─────────────┐
//!         │ Local Repository        │
//!         │ (in-memory)             │
//!         └─────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let registry = RecordTypeRegistry::standard();
//! let repo = LocalRepository::new();
//! services::insert_records(&repo, &records).await?;
//! let output = services::aggregate(&repo, &registry, &request, ZoneOffset::UTC).await?;
//! ```

use log::{debug, info, warn};
use uuid::Uuid;

use super::aggregation::{self, AggregationPlan};
use super::cursor::RowCursor;
use super::registry::RecordTypeRegistry;
use super::repository::{FullRepository, RepositoryError, RepositoryResult};
use crate::aggregation::{
    AggregateDataResponse, AggregationError, AggregationOutput, AggregationResult, DurationGrid,
    PeriodGrid,
};
use crate::models::{
    AggregateRecordsResponse, AggregateRequest, AggregateResult, AggregationKind, BucketSize,
    ReadRecordsRequest, ReadRecordsResponse, Record, TimeWindow, ZoneOffset,
};

// ==================== Health & Records ====================

/// Check if the backing store is healthy.
pub async fn health_check<R: FullRepository + ?Sized>(repo: &R) -> RepositoryResult<bool> {
    repo.health_check().await
}

/// Store a batch of records.
pub async fn insert_records<R: FullRepository + ?Sized>(
    repo: &R,
    records: &[Record],
) -> RepositoryResult<Vec<Uuid>> {
    if records.is_empty() {
        warn!("insert_records called with an empty batch");
        return Ok(Vec::new());
    }
    let ids = repo.insert_records(records).await?;
    info!("Inserted {} records", ids.len());
    Ok(ids)
}

/// Read records by filter or identifiers.
pub async fn read_records<R: FullRepository + ?Sized>(
    repo: &R,
    request: &ReadRecordsRequest,
) -> RepositoryResult<ReadRecordsResponse> {
    let response = repo.read_records(request).await?;
    debug!(
        "Read {} {} records (next page token: {:?})",
        response.records.len(),
        request.record_type(),
        response.next_page_token
    );
    Ok(response)
}

// ==================== Aggregation ====================

/// Answer an aggregation request.
///
/// `zone` resolves local time ranges and period buckets. Kinds with no plan
/// in `registry` produce absent results rather than an error.
///
/// # Returns
/// * `Ok(AggregationOutput::Ungrouped)` when the request has no bucket size
/// * `Ok(AggregationOutput::ByDuration | ByPeriod)` for grouped requests
/// * `Err(AggregationError)` on invalid requests or storage failures
pub async fn aggregate<R: FullRepository + ?Sized>(
    repo: &R,
    registry: &RecordTypeRegistry,
    request: &AggregateRequest,
    zone: ZoneOffset,
) -> AggregationResult<AggregationOutput> {
    if request.kinds.is_empty() {
        return Err(AggregationError::InvalidRequest(
            "at least one aggregation kind is required".to_string(),
        ));
    }

    let plans: Vec<(AggregationKind, Option<&AggregationPlan>)> = request
        .kinds
        .iter()
        .map(|&kind| {
            let plan = registry.plan_for(kind.record_type(), kind);
            if plan.is_none() {
                warn!("No aggregation plan registered for {}; result will be absent", kind);
            }
            (kind, plan)
        })
        .collect();

    let range = request.time_range;
    let windows = match request.bucket {
        None => vec![range.window(zone).ok_or_else(|| {
            AggregationError::InvalidRequest(
                "time range is outside the representable range".to_string(),
            )
        })?],
        Some(BucketSize::Duration { millis }) => {
            DurationGrid::new(&range, zone, millis)?.query_windows()
        }
        Some(BucketSize::Period { days }) => PeriodGrid::new(&range, zone, days)?.query_windows()?,
    };

    info!(
        "Aggregating {} kinds over {} windows",
        request.kinds.len(),
        windows.len()
    );

    let mut per_bucket = Vec::with_capacity(windows.len());
    for window in windows {
        per_bucket.push(aggregate_window(repo, &plans, window, request).await?);
    }

    let mut response = AggregateDataResponse::new(per_bucket).with_zone(zone);
    response.set_time_range(range);
    match request.bucket {
        None => {}
        Some(BucketSize::Duration { millis }) => response.set_duration(millis),
        Some(BucketSize::Period { days }) => response.set_period(days),
    }
    response.assemble()
}

async fn aggregate_window<R: FullRepository + ?Sized>(
    repo: &R,
    plans: &[(AggregationKind, Option<&AggregationPlan>)],
    window: TimeWindow,
    request: &AggregateRequest,
) -> AggregationResult<AggregateRecordsResponse> {
    let mut response = AggregateRecordsResponse::new();
    for &(kind, plan) in plans {
        let result = match plan {
            None => AggregateResult::absent(),
            Some(plan) => {
                let mut cursor = repo
                    .aggregate_window(plan, window, &request.data_origins)
                    .await?;
                if !cursor.move_to_next() {
                    return Err(RepositoryError::QueryError(format!(
                        "aggregation of {} returned no result row",
                        kind
                    ))
                    .into());
                }
                aggregation::extract(&cursor, plan)?
            }
        };
        response.insert(kind, result);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::LocalRepository;
    use crate::models::{AggregateValue, DataOrigin, RecordPayload, RecordType, TimeRangeFilter};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    const HOUR: i64 = 3_600_000;

    fn steps(start: i64, count: i64) -> Record {
        Record::new(
            DataOrigin::new("com.example.steps"),
            Utc.timestamp_millis_opt(start).unwrap(),
            Utc.timestamp_millis_opt(start + 60_000).unwrap(),
            RecordPayload::Steps { count },
        )
    }

    #[tokio::test]
    async fn test_empty_insert_is_noop() {
        let repo = LocalRepository::new();
        assert!(insert_records(&repo, &[]).await.unwrap().is_empty());
        assert!(health_check(&repo).await.unwrap());
    }

    #[tokio::test]
    async fn test_ungrouped_aggregate() {
        let repo = LocalRepository::new();
        insert_records(&repo, &[steps(0, 10), steps(HOUR, 5)]).await.unwrap();
        let registry = RecordTypeRegistry::standard();

        let request = AggregateRequest::new(
            vec![AggregationKind::StepsCountTotal],
            TimeRangeFilter::from_millis(0, 2 * HOUR).unwrap(),
        );
        let output = aggregate(&repo, &registry, &request, ZoneOffset::UTC).await.unwrap();
        match output {
            AggregationOutput::Ungrouped(result) => assert_eq!(
                result.get(AggregationKind::StepsCountTotal).unwrap().value,
                Some(AggregateValue::Long(15))
            ),
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_absent() {
        let registry = Arc::new(RecordTypeRegistry::builder().register(RecordType::Steps).build());
        let repo = LocalRepository::with_registry(registry.clone());
        insert_records(&repo, &[steps(0, 10)]).await.unwrap();

        let request = AggregateRequest::new(
            vec![AggregationKind::StepsCountTotal, AggregationKind::HeartRateBpmMax],
            TimeRangeFilter::from_millis(0, HOUR).unwrap(),
        )
        .grouped_by(BucketSize::Duration { millis: HOUR });

        let output = aggregate(&repo, &registry, &request, ZoneOffset::UTC).await.unwrap();
        let AggregationOutput::ByDuration(groups) = output else {
            panic!("expected duration groups");
        };
        assert_eq!(groups.len(), 1);
        assert!(groups[0].result.get(AggregationKind::HeartRateBpmMax).unwrap().is_absent());
        assert!(!groups[0].result.get(AggregationKind::StepsCountTotal).unwrap().is_absent());
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let repo = LocalRepository::new();
        let registry = RecordTypeRegistry::standard();
        let range = TimeRangeFilter::from_millis(0, HOUR).unwrap();

        let empty = AggregateRequest::new(vec![], range);
        assert!(matches!(
            aggregate(&repo, &registry, &empty, ZoneOffset::UTC).await,
            Err(AggregationError::InvalidRequest(_))
        ));

        let zero = AggregateRequest::new(vec![AggregationKind::StepsCountTotal], range)
            .grouped_by(BucketSize::Duration { millis: 0 });
        assert!(matches!(
            aggregate(&repo, &registry, &zero, ZoneOffset::UTC).await,
            Err(AggregationError::InvalidBucketSize(_))
        ));
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_as_error() {
        let repo = LocalRepository::new();
        repo.set_healthy(false).unwrap();
        let registry = RecordTypeRegistry::standard();

        let request = AggregateRequest::new(
            vec![AggregationKind::StepsCountTotal],
            TimeRangeFilter::from_millis(0, HOUR).unwrap(),
        );
        assert!(matches!(
            aggregate(&repo, &registry, &request, ZoneOffset::UTC).await,
            Err(AggregationError::Repository(RepositoryError::ConnectionError(_)))
        ));
    }
}
