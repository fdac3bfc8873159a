//! Job submission.
//!
//! A submission writes a `Pending` ledger row, then the input artifact
//! `<job_id><ext>` tagged with the operation metadata. Writing the artifact
//! is what triggers processing.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::artifact::{metadata_keys, ArtifactError, ArtifactMetadata, ArtifactStore, Container};
use crate::job::{JobLedger, JobRecord, LedgerError};

/// Errors from submitting a job.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] ArtifactError),
}

/// A job accepted for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedJob {
    pub job_id: String,
    /// Name of the input artifact.
    pub artifact_name: String,
}

/// Lowercased extension of `file_name` with its dot, or empty.
fn artifact_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Accepts uploads and hands them to the orchestrator through the store.
pub struct JobSubmitter {
    store: Arc<dyn ArtifactStore>,
    ledger: Arc<dyn JobLedger>,
    partition: String,
}

impl JobSubmitter {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        ledger: Arc<dyn JobLedger>,
        partition: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ledger,
            partition: partition.into(),
        }
    }

    /// Submits `data` uploaded as `file_name` for `operation`.
    ///
    /// The operation is not checked here; an unknown one fails the job.
    pub async fn submit(
        &self,
        file_name: &str,
        data: Bytes,
        operation: &str,
        params: Option<String>,
    ) -> Result<SubmittedJob, SubmitError> {
        let original_filename = Path::new(file_name.trim())
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        if original_filename.is_empty() {
            return Err(SubmitError::InvalidRequest("file name is empty".to_string()));
        }
        let operation = operation.trim();
        if operation.is_empty() {
            return Err(SubmitError::InvalidRequest("operation is required".to_string()));
        }
        let params = params.filter(|p| !p.trim().is_empty());

        let job_id = Uuid::new_v4().to_string();
        let artifact_name = format!("{}{}", job_id, artifact_extension(&original_filename));

        let record = JobRecord::pending(job_id.clone(), Utc::now())
            .with_operation(operation)
            .with_params(params.clone())
            .with_original_filename(original_filename.clone());
        self.ledger
            .upsert(&self.partition, &job_id, &record.to_fields())?;

        let mut metadata = ArtifactMetadata::new();
        metadata.insert(metadata_keys::OPERATION.to_string(), operation.to_string());
        metadata.insert(
            metadata_keys::ORIGINAL_FILENAME.to_string(),
            original_filename.clone(),
        );
        if let Some(params) = params {
            metadata.insert(metadata_keys::PARAMS.to_string(), params);
        }

        let size = data.len();
        if let Err(e) = self
            .store
            .put(Container::Input, &artifact_name, data, metadata)
            .await
        {
            // The row stays Pending: only the orchestrator moves a job on.
            warn!(job_id = %job_id, error = %e, "Failed to store input artifact");
            return Err(e.into());
        }

        info!(
            job_id = %job_id,
            operation = %operation,
            file = %original_filename,
            size,
            "Job submitted"
        );

        Ok(SubmittedJob {
            job_id,
            artifact_name,
        })
    }
}
