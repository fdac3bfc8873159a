//! Job ledger trait and types.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use super::types::JobStatus;

/// Flat field map stored per ledger row.
pub type LedgerFields = BTreeMap<String, String>;

/// Error type for ledger operations.
#[derive(Debug)]
pub enum LedgerError {
    /// The backing database failed.
    Database(String),
    /// A row could not be encoded or decoded.
    Serialization(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Database(msg) => write!(f, "Database error: {}", msg),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl LedgerError {
    /// Serialization failures are deterministic and will not heal on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Database(_))
    }
}

/// A stored row with its keys.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub partition_key: String,
    pub row_key: String,
    pub fields: LedgerFields,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing rows.
#[derive(Debug, Clone)]
pub struct JobFilter {
    /// Filter by status.
    pub status: Option<JobStatus>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Keyed table of job rows.
///
/// Rows are addressed by `(partition, row_key)`. `upsert` replaces the
/// whole field map; fields absent from the new map are removed.
pub trait JobLedger: Send + Sync {
    /// Insert or fully replace a row.
    fn upsert(
        &self,
        partition: &str,
        row_key: &str,
        fields: &LedgerFields,
    ) -> Result<(), LedgerError>;

    /// Get a row's fields, or `None` if absent.
    fn get(&self, partition: &str, row_key: &str) -> Result<Option<LedgerFields>, LedgerError>;

    /// List rows in a partition, most recently updated first.
    fn list(&self, partition: &str, filter: &JobFilter) -> Result<Vec<LedgerRow>, LedgerError>;

    /// Count rows in a partition matching the filter (ignores limit/offset).
    fn count(&self, partition: &str, filter: &JobFilter) -> Result<i64, LedgerError>;
}
