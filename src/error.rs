//! Error types for the preparation and segmentation pipeline

use thiserror::Error;

/// Errors raised by the pipeline stages.
///
/// Every variant is an input-validation failure detected before a stage
/// produces its output, so a failed stage never leaves a partially
/// transformed table behind.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A declared column is missing or has the wrong kind.
    #[error("schema error on column '{column}': {reason}")]
    Schema { column: String, reason: String },

    /// A feature has zero variance and the caller disabled zero-fill.
    #[error("feature '{column}' has zero variance")]
    DegenerateFeature { column: String },

    /// Cluster count outside `[2, rows]`.
    #[error("invalid cluster count {k} for {rows} rows (expected 2 <= k <= rows)")]
    InvalidClusterCount { k: usize, rows: usize },
}

impl Error {
    pub(crate) fn schema(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Schema {
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_column(column: &str) -> Self {
        Self::schema(column, "column not found")
    }
}

/// Result type used by the library stages
pub type Result<T> = std::result::Result<T, Error>;
