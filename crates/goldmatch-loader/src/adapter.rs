//! Table loader trait for obtaining result tables

use goldmatch_core::{Table, TableError};
use std::time::Duration;

/// Errors that can occur when loading a result table
///
/// A load error is never a comparison outcome: the scorer records it as a
/// failed load, distinct from a wrong answer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("Result not found: {0}")]
    NotFound(String),

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Malformed result: {0}")]
    Malformed(String),

    #[error("Timed out after {limit:?} loading {instance_id}")]
    Timeout { instance_id: String, limit: Duration },

    #[error("IO error: {0}")]
    Io(String),
}

impl LoadError {
    /// Stable short name used in reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Execution(_) => "execution",
            Self::Malformed(_) => "malformed",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
        }
    }
}

impl From<TableError> for LoadError {
    fn from(err: TableError) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Trait for sources of result tables
///
/// Implementations may read pre-computed files, call a query service or
/// return canned tables; the comparator never knows which.
#[async_trait::async_trait]
pub trait TableLoader: Send + Sync {
    /// Get the loader name (e.g., "csv", "json")
    fn name(&self) -> &'static str;

    /// Load the result table for an instance
    async fn load(&self, instance_id: &str) -> Result<Table, LoadError>;

    /// Load every acceptable result table for an instance
    ///
    /// Gold sources may hold several equally valid results for one
    /// question. The default returns the single table from `load`.
    async fn load_variants(&self, instance_id: &str) -> Result<Vec<Table>, LoadError> {
        Ok(vec![self.load(instance_id).await?])
    }
}
