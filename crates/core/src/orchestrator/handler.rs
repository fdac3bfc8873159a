//! Single-job state machine.
//!
//! One call to [`JobOrchestrator::handle_artifact`] drives the job behind an
//! input artifact from `Pending` to `Completed` or `Failed`:
//!
//! 1. Skip if the job is terminal or already being handled here.
//! 2. Write `Processing` as a complete record (carrying over submitted fields).
//! 3. Dispatch to the processor selected by the `operation` metadata.
//! 4. Write `Completed` (with the primary output) or `Failed` (with the error).
//! 5. On success, delete the input artifact.
//!
//! Errors after step 2 never escape: they become the `Failed` record.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::artifact::{job_id_from_artifact, metadata_keys, ArtifactMetadata, ArtifactStore, Container};
use crate::job::{fields, lookup_job, JobLedger, JobRecord, JobStatus, JobView, LedgerError};
use crate::metrics;
use crate::processor::{OutputLocator, OutputSink, ProcessRequest, ProcessorRegistry};
use crate::shortener::UrlShortener;

use super::config::OrchestratorConfig;
use super::types::{truncate_message, JobError, JobOutcome, OrchestratorError, SkipReason};

/// Pause before retrying a failed terminal write.
const TERMINAL_WRITE_BACKOFF: Duration = Duration::from_millis(200);

/// Job ids currently handled by this process.
type InFlightSet = Arc<Mutex<HashSet<String>>>;

/// Marks a job id as in flight until dropped.
struct InFlightGuard {
    set: InFlightSet,
    job_id: String,
}

impl InFlightGuard {
    /// Returns `None` if the job id is already in flight.
    fn acquire(set: &InFlightSet, job_id: &str) -> Option<Self> {
        let mut ids = set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !ids.insert(job_id.to_string()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            job_id: job_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut ids = self.set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.remove(&self.job_id);
    }
}

/// Drives jobs through their state machine.
pub struct JobOrchestrator {
    config: OrchestratorConfig,
    partition: String,
    store: Arc<dyn ArtifactStore>,
    ledger: Arc<dyn JobLedger>,
    registry: Arc<ProcessorRegistry>,
    shortener: Option<(Arc<dyn UrlShortener>, Duration)>,
    in_flight: InFlightSet,
}

impl JobOrchestrator {
    /// Create a new orchestrator writing job rows under `partition`.
    pub fn new(
        config: OrchestratorConfig,
        partition: impl Into<String>,
        store: Arc<dyn ArtifactStore>,
        ledger: Arc<dyn JobLedger>,
        registry: Arc<ProcessorRegistry>,
    ) -> Self {
        Self {
            config,
            partition: partition.into(),
            store,
            ledger,
            registry,
            shortener: None,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Shortens output URLs, giving up after `timeout`.
    pub fn with_shortener(mut self, shortener: Arc<dyn UrlShortener>, timeout: Duration) -> Self {
        self.shortener = Some((shortener, timeout));
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<dyn JobLedger> {
        &self.ledger
    }

    /// Client view of a job.
    pub fn lookup(&self, job_id: &str) -> Result<JobView, LedgerError> {
        lookup_job(self.ledger.as_ref(), &self.partition, job_id)
    }

    /// Number of jobs currently being handled.
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Handles the input artifact `name`.
    ///
    /// Returns an error only when nothing durable could be recorded: the
    /// artifact name is unusable, the `Processing` write failed (the job
    /// stays `Pending`), or the terminal write failed after retries.
    pub async fn handle_artifact(&self, name: &str) -> Result<JobOutcome, OrchestratorError> {
        let job_id = job_id_from_artifact(name)
            .ok_or_else(|| OrchestratorError::InvalidArtifactName(name.to_string()))?
            .to_string();

        let span = info_span!("job", job_id = %job_id, artifact = %name);
        self.run(job_id, name).instrument(span).await
    }

    async fn run(&self, job_id: String, name: &str) -> Result<JobOutcome, OrchestratorError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &job_id) else {
            debug!("Job already in flight, skipping");
            return Ok(self.skipped(job_id, SkipReason::AlreadyInFlight));
        };

        let existing = match self.ledger.get(&self.partition, &job_id)? {
            Some(row) => {
                if let Some(raw) = row.get(fields::STATUS) {
                    if raw.parse::<JobStatus>().is_err() {
                        warn!(status = %raw, "Unrecognized job status, skipping");
                        return Ok(self.skipped(job_id, SkipReason::UnrecognizedStatus));
                    }
                }
                Some(JobRecord::from_fields(job_id.clone(), &row))
            }
            None => None,
        };

        if let Some(record) = &existing {
            if record.status.is_terminal() {
                info!(status = %record.status, "Job already terminal, skipping");
                return Ok(self.skipped(job_id, SkipReason::AlreadyTerminal(record.status)));
            }
        } else {
            debug!("No ledger row for job, creating one");
        }

        metrics::JOBS_STARTED.inc();
        let started = Instant::now();

        let metadata = self.store.get_metadata(Container::Input, name).await;
        let mut record = existing.unwrap_or_else(|| JobRecord::pending(job_id.clone(), Utc::now()));
        if let Ok(metadata) = &metadata {
            record = apply_metadata(record, metadata);
        }

        let record = record.into_processing(Utc::now());
        self.ledger
            .upsert(&self.partition, &job_id, &record.to_fields())?;
        info!(operation = record.operation.as_deref().unwrap_or("-"), "Job processing");

        let result = match metadata {
            Ok(_) => self.execute(&record, name).await,
            Err(e) => Err(JobError::from(e)),
        };

        let operation_label = self.operation_label(&record);
        let (terminal, outcome) = match result {
            Ok(locator) => {
                let short_url = self.shorten(&locator.url).await;
                info!(output = %locator.name, url = %locator.url, "Job completed");
                let outcome = JobOutcome::Completed {
                    job_id: job_id.clone(),
                    output_url: locator.url.clone(),
                    short_url: short_url.clone(),
                };
                (record.into_completed(locator.url, short_url, Utc::now()), outcome)
            }
            Err(err) => {
                warn!(error = %err, "Job failed");
                let message = truncate_message(&err.to_string(), self.config.max_error_message_len);
                let outcome = JobOutcome::Failed {
                    job_id: job_id.clone(),
                    error: message.clone(),
                };
                (record.into_failed(message, Utc::now()), outcome)
            }
        };

        self.write_terminal(&terminal).await?;

        if matches!(outcome, JobOutcome::Completed { .. }) {
            self.cleanup_input(name).await;
        }

        metrics::JOB_OUTCOMES
            .with_label_values(&[outcome.label()])
            .inc();
        metrics::JOB_DURATION
            .with_label_values(&[operation_label.as_str(), outcome.label()])
            .observe(started.elapsed().as_secs_f64());

        Ok(outcome)
    }

    /// Runs the processor for `record` and returns its primary output.
    async fn execute(&self, record: &JobRecord, name: &str) -> Result<OutputLocator, JobError> {
        let operation = record
            .operation
            .clone()
            .filter(|op| !op.trim().is_empty())
            .ok_or(JobError::MissingOperation)?;

        let input = self.store.get_stream(Container::Input, name).await?;
        let request = ProcessRequest {
            operation,
            base_name: record.job_id.clone(),
            original_name: record
                .original_filename
                .clone()
                .unwrap_or_else(|| name.to_string()),
            params: record.params.clone(),
            input,
        };

        let sink = OutputSink::new(Arc::clone(&self.store));
        let output = self.registry.handle(request, &sink).await?;
        debug!(outputs = output.outputs.len(), "Processor finished");

        output.primary().cloned().ok_or(JobError::EmptyResult)
    }

    /// Best-effort short link for `url`.
    async fn shorten(&self, url: &str) -> Option<String> {
        let (shortener, limit) = self.shortener.as_ref()?;

        match tokio::time::timeout(*limit, shortener.shorten(url)).await {
            Ok(Ok(short)) => {
                metrics::SHORTENER_RESULTS.with_label_values(&["ok"]).inc();
                Some(short)
            }
            Ok(Err(e)) => {
                metrics::SHORTENER_RESULTS.with_label_values(&["error"]).inc();
                warn!(shortener = shortener.name(), error = %e, "URL shortening failed");
                None
            }
            Err(_) => {
                metrics::SHORTENER_RESULTS.with_label_values(&["timeout"]).inc();
                warn!(
                    shortener = shortener.name(),
                    timeout_ms = limit.as_millis() as u64,
                    "URL shortening timed out"
                );
                None
            }
        }
    }

    /// Writes a Completed/Failed record, retrying retryable ledger errors.
    async fn write_terminal(&self, record: &JobRecord) -> Result<(), OrchestratorError> {
        let fields = record.to_fields();
        let mut attempt = 0;

        loop {
            match self.ledger.upsert(&self.partition, &record.job_id, &fields) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.config.terminal_write_retries => {
                    attempt += 1;
                    metrics::LEDGER_WRITE_RETRIES.inc();
                    warn!(status = %record.status, attempt, error = %e, "Terminal write failed, retrying");
                    tokio::time::sleep(TERMINAL_WRITE_BACKOFF).await;
                }
                Err(e) => {
                    error!(status = %record.status, error = %e, "Terminal write failed");
                    return Err(OrchestratorError::TerminalWrite {
                        job_id: record.job_id.clone(),
                        source: e,
                    });
                }
            }
        }
    }

    async fn cleanup_input(&self, name: &str) {
        match self.store.delete(Container::Input, name).await {
            Ok(true) => debug!("Input artifact deleted"),
            Ok(false) => debug!("Input artifact already gone"),
            Err(e) => {
                metrics::INPUT_CLEANUP_FAILURES.inc();
                warn!(error = %e, "Failed to delete input artifact");
            }
        }
    }

    fn skipped(&self, job_id: String, reason: SkipReason) -> JobOutcome {
        let outcome = JobOutcome::Skipped { job_id, reason };
        metrics::JOB_OUTCOMES
            .with_label_values(&[outcome.label()])
            .inc();
        outcome
    }

    /// Operation name as a metric label. Anything a processor does not
    /// implement by name collapses to `unknown`, so prefix routes cannot
    /// mint new series.
    fn operation_label(&self, record: &JobRecord) -> String {
        match &record.operation {
            Some(op) if self.registry.is_known_operation(op) => op.clone(),
            _ => "unknown".to_string(),
        }
    }
}

/// Overlays the artifact's metadata on the submitted record.
fn apply_metadata(mut record: JobRecord, metadata: &ArtifactMetadata) -> JobRecord {
    if let Some(operation) = metadata.get(metadata_keys::OPERATION) {
        record.operation = Some(operation.clone());
    }
    if let Some(params) = metadata.get(metadata_keys::PARAMS) {
        record.params = Some(params.clone());
    }
    if let Some(name) = metadata.get(metadata_keys::ORIGINAL_FILENAME) {
        record.original_filename = Some(name.clone());
    }
    record
}
