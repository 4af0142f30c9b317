//! Record storage and read path.

use async_trait::async_trait;
use uuid::Uuid;

use super::error::RepositoryResult;
use crate::models::{ReadRecordsRequest, ReadRecordsResponse, Record};

/// Repository trait for storing and reading typed records.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Check if the backing store is healthy.
    ///
    /// # Returns
    /// - `Ok(true)` if the store is reachable
    /// - `Ok(false)` if it is unhealthy but no error occurred
    /// - `Err(RepositoryError)` if the check itself failed
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Store a batch of records.
    ///
    /// The batch is validated and encoded as a whole before anything is
    /// written; a failure leaves the store unchanged.
    ///
    /// # Returns
    /// * `Ok(Vec<Uuid>)` - Identifiers of the stored records, in input order
    /// * `Err(RepositoryError::ValidationError)` - On a duplicate identifier or
    ///   an inverted time interval
    /// * `Err(RepositoryError::Unregistered)` - If a record's type has no codec
    async fn insert_records(&self, records: &[Record]) -> RepositoryResult<Vec<Uuid>>;

    /// Read records by filter or by identifier.
    ///
    /// Filter reads are paged; the returned `next_page_token` is `None` once
    /// the result set is exhausted. Identifier reads return every match in
    /// ascending start time order and are never paged.
    async fn read_records(&self, request: &ReadRecordsRequest)
        -> RepositoryResult<ReadRecordsResponse>;
}
