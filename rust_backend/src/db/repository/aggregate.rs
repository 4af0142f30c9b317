//! Aggregation execution.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::db::aggregation::AggregationPlan;
use crate::db::cursor::MemoryCursor;
use crate::models::{DataOrigin, TimeWindow};

/// Repository trait for executing aggregation plans.
#[async_trait]
pub trait AggregationRepository: Send + Sync {
    /// Run `plan` over the rows whose time column falls in `[window.start, window.end)`.
    ///
    /// When `data_origins` is non-empty only rows written by those packages
    /// contribute.
    ///
    /// # Returns
    /// A cursor over exactly one result row holding the plan's value column,
    /// the zone offset column and the contributing data origins. Every cell
    /// is NULL (or an empty list) when no rows contributed.
    async fn aggregate_window(
        &self,
        plan: &AggregationPlan,
        window: TimeWindow,
        data_origins: &[DataOrigin],
    ) -> RepositoryResult<MemoryCursor>;
}
