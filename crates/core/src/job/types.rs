//! Job lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ledger::LedgerFields;

/// Ledger field names for a job row.
pub mod fields {
    pub const STATUS: &str = "status";
    pub const OPERATION: &str = "operation";
    pub const PARAMS: &str = "params";
    pub const ORIGINAL_FILENAME: &str = "original_filename";
    pub const OUTPUT_URL: &str = "output_url";
    pub const SHORT_URL: &str = "short_url";
    pub const ERROR_MESSAGE: &str = "error_message";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
}

/// Status of a job.
///
/// `Pending -> Processing -> Completed | Failed`. Terminal states never
/// move again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Canonical lowercase name, as written to the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn all() -> [JobStatus; 4] {
        [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown job status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    /// Case-insensitive; rows written by older tooling use `Pending`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A job as tracked in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    /// Present only when completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_url: Option<String>,
    /// Present only when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// A freshly submitted job.
    pub fn pending(job_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            operation: None,
            params: None,
            original_filename: None,
            output_url: None,
            short_url: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_params(mut self, params: Option<String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_original_filename(mut self, name: impl Into<String>) -> Self {
        self.original_filename = Some(name.into());
        self
    }

    /// Moves to `Processing`, dropping any stale result fields.
    pub fn into_processing(self, now: DateTime<Utc>) -> Self {
        Self {
            status: JobStatus::Processing,
            output_url: None,
            short_url: None,
            error_message: None,
            updated_at: now,
            ..self
        }
    }

    pub fn into_completed(
        self,
        output_url: String,
        short_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status: JobStatus::Completed,
            output_url: Some(output_url),
            short_url,
            error_message: None,
            updated_at: now,
            ..self
        }
    }

    pub fn into_failed(self, error_message: String, now: DateTime<Utc>) -> Self {
        Self {
            status: JobStatus::Failed,
            output_url: None,
            short_url: None,
            error_message: Some(error_message),
            updated_at: now,
            ..self
        }
    }

    /// Serializes into ledger fields. Absent options are omitted.
    pub fn to_fields(&self) -> LedgerFields {
        let mut map = LedgerFields::new();
        map.insert(fields::STATUS.to_string(), self.status.as_str().to_string());
        let optional = [
            (fields::OPERATION, &self.operation),
            (fields::PARAMS, &self.params),
            (fields::ORIGINAL_FILENAME, &self.original_filename),
            (fields::OUTPUT_URL, &self.output_url),
            (fields::SHORT_URL, &self.short_url),
            (fields::ERROR_MESSAGE, &self.error_message),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                map.insert(key.to_string(), value.clone());
            }
        }
        map.insert(fields::CREATED_AT.to_string(), self.created_at.to_rfc3339());
        map.insert(fields::UPDATED_AT.to_string(), self.updated_at.to_rfc3339());
        map
    }

    /// Rebuilds a record from ledger fields.
    ///
    /// A missing or unrecognized status reads as `Pending`. Missing
    /// timestamps read as the Unix epoch.
    pub fn from_fields(job_id: impl Into<String>, map: &LedgerFields) -> Self {
        let get = |key: &str| map.get(key).cloned();
        let timestamp = |key: &str| {
            map.get(key)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(DateTime::UNIX_EPOCH)
        };

        Self {
            job_id: job_id.into(),
            status: map
                .get(fields::STATUS)
                .and_then(|s| s.parse().ok())
                .unwrap_or(JobStatus::Pending),
            operation: get(fields::OPERATION),
            params: get(fields::PARAMS),
            original_filename: get(fields::ORIGINAL_FILENAME),
            output_url: get(fields::OUTPUT_URL),
            short_url: get(fields::SHORT_URL),
            error_message: get(fields::ERROR_MESSAGE),
            created_at: timestamp(fields::CREATED_AT),
            updated_at: timestamp(fields::UPDATED_AT),
        }
    }
}
