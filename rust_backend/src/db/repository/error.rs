//! Error types for repository operations.

use crate::models::RecordType;

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Data validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A row lacks a column the codec expects, or holds the wrong storage kind.
    #[error("Schema mismatch on column '{column}': {detail}")]
    SchemaMismatch { column: String, detail: String },

    /// A record was handed to a codec built for a different layout.
    #[error("Codec mismatch: {0}")]
    CodecMismatch(String),

    #[error("Record type {0} is not registered")]
    Unregistered(RecordType),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl RepositoryError {
    pub(crate) fn missing_column(column: &str) -> Self {
        RepositoryError::SchemaMismatch {
            column: column.to_string(),
            detail: "column not present in row".to_string(),
        }
    }
}

impl From<String> for RepositoryError {
    fn from(s: String) -> Self {
        RepositoryError::InternalError(s)
    }
}

impl From<&str> for RepositoryError {
    fn from(s: &str) -> Self {
        RepositoryError::InternalError(s.to_string())
    }
}
