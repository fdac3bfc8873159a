//! Types for the job orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::job::{JobStatus, LedgerError};
use crate::processor::ProcessorError;

/// Why a job ended in `Failed`.
///
/// Every variant is terminal: the orchestrator records it and never retries.
#[derive(Debug, Error)]
pub enum JobError {
    /// No processor is registered for the operation.
    #[error("Unknown operation: {operation}")]
    UnknownOperation { operation: String },

    /// The input artifact carries no operation.
    #[error("Input artifact has no operation metadata")]
    MissingOperation,

    /// The processor failed.
    #[error("Processing failed: {0}")]
    Processing(ProcessorError),

    /// The processor succeeded without producing an output.
    #[error("Processor returned no output (empty result)")]
    EmptyResult,

    /// Reading the input artifact failed.
    #[error("Input artifact unavailable: {0}")]
    Store(#[from] ArtifactError),
}

impl From<ProcessorError> for JobError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::UnknownOperation { operation } => Self::UnknownOperation { operation },
            other => Self::Processing(other),
        }
    }
}

/// Errors that escape the orchestrator.
///
/// The job itself is left in its last durable state (`Pending` or
/// `Processing`) and will be picked up again by recovery.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The artifact name does not map to a job id.
    #[error("invalid artifact name: {0}")]
    InvalidArtifactName(String),

    /// Ledger failure outside the terminal write.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The Completed/Failed write failed after all retries.
    #[error("terminal write for job {job_id} failed: {source}")]
    TerminalWrite {
        job_id: String,
        #[source]
        source: LedgerError,
    },
}

/// Why an invocation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum SkipReason {
    /// The job already reached a terminal status.
    AlreadyTerminal(JobStatus),
    /// Another invocation in this process is handling the job.
    AlreadyInFlight,
    /// The ledger row carries a status this version does not know.
    UnrecognizedStatus,
}

/// Result of one orchestrator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        job_id: String,
        output_url: String,
        short_url: Option<String>,
    },
    Failed {
        job_id: String,
        error: String,
    },
    Skipped {
        job_id: String,
        reason: SkipReason,
    },
}

impl JobOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            JobOutcome::Completed { job_id, .. }
            | JobOutcome::Failed { job_id, .. }
            | JobOutcome::Skipped { job_id, .. } => job_id,
        }
    }

    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Completed { .. } => "completed",
            JobOutcome::Failed { .. } => "failed",
            JobOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// Current status of the job runner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerStatus {
    /// Whether the runner is running.
    pub running: bool,
    /// Jobs currently being handled.
    pub in_flight: usize,
    /// Invocations finished since start, any outcome.
    pub handled_total: u64,
    pub completed_total: u64,
    pub failed_total: u64,
    pub skipped_total: u64,
}

/// Truncates `message` to at most `max_chars` characters.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}
