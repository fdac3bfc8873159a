//! Trigger loop feeding input artifacts to the orchestrator.
//!
//! - Events: every artifact written to the input container starts a job
//! - Concurrency: at most `max_concurrent_jobs` jobs run at once
//! - Recovery: on start, leftover input artifacts are re-driven

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::artifact::{job_id_from_artifact, ArtifactEvent, Container};
use crate::job::{JobRecord, JobStatus};

use super::handler::JobOrchestrator;
use super::types::{JobOutcome, OrchestratorError, RunnerStatus};

/// How long `stop` waits for running jobs to finish.
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// State shared between the runner and its tasks.
struct Shared {
    orchestrator: Arc<JobOrchestrator>,
    running: AtomicBool,
    permits: Arc<Semaphore>,
    in_flight: AtomicUsize,
    handled_total: AtomicU64,
    completed_total: AtomicU64,
    failed_total: AtomicU64,
    skipped_total: AtomicU64,
}

impl Shared {
    fn record(&self, result: &Result<JobOutcome, OrchestratorError>) {
        self.handled_total.fetch_add(1, Ordering::Relaxed);
        let counter = match result {
            Ok(JobOutcome::Completed { .. }) => &self.completed_total,
            Ok(JobOutcome::Skipped { .. }) => &self.skipped_total,
            Ok(JobOutcome::Failed { .. }) | Err(_) => &self.failed_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Runs the orchestrator for every new input artifact.
pub struct JobRunner {
    shared: Arc<Shared>,
    max_concurrent_jobs: usize,
    shutdown_tx: broadcast::Sender<()>,
}

impl JobRunner {
    /// Create a new runner. Concurrency and recovery follow the
    /// orchestrator's configuration.
    pub fn new(orchestrator: Arc<JobOrchestrator>) -> Self {
        let max_concurrent_jobs = orchestrator.config().max_concurrent_jobs.max(1);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            shared: Arc::new(Shared {
                orchestrator,
                running: AtomicBool::new(false),
                permits: Arc::new(Semaphore::new(max_concurrent_jobs)),
                in_flight: AtomicUsize::new(0),
                handled_total: AtomicU64::new(0),
                completed_total: AtomicU64::new(0),
                failed_total: AtomicU64::new(0),
                skipped_total: AtomicU64::new(0),
            }),
            max_concurrent_jobs,
            shutdown_tx,
        }
    }

    pub fn orchestrator(&self) -> &Arc<JobOrchestrator> {
        &self.shared.orchestrator
    }

    /// Start the runner (spawns the event loop).
    pub async fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            warn!("Job runner already running");
            return;
        }

        info!(
            max_concurrent_jobs = self.max_concurrent_jobs,
            "Starting job runner"
        );

        // Subscribe first so uploads arriving during recovery are not lost.
        let events = self.shared.orchestrator.store().subscribe();

        if self.shared.orchestrator.config().recover_on_start {
            let dispatched = rescan(&self.shared).await;
            if dispatched > 0 {
                info!(dispatched, "Recovered leftover input artifacts");
            }
        }

        self.spawn_event_loop(events);

        info!("Job runner started");
    }

    /// Stop the runner, waiting for running jobs to finish.
    pub async fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            warn!("Job runner not running");
            return;
        }

        info!("Stopping job runner");

        let _ = self.shutdown_tx.send(());

        // Holding every permit means no job is running.
        let all = self.max_concurrent_jobs as u32;
        match tokio::time::timeout(STOP_GRACE_PERIOD, self.shared.permits.acquire_many(all)).await {
            Ok(Ok(_permits)) => info!("Job runner stopped"),
            Ok(Err(_)) => warn!("Job runner permits closed"),
            Err(_) => warn!(
                in_flight = self.shared.in_flight.load(Ordering::Relaxed),
                "Job runner stopped with jobs still running"
            ),
        }
    }

    /// Get current runner status.
    pub fn status(&self) -> RunnerStatus {
        let shared = &self.shared;
        RunnerStatus {
            running: shared.running.load(Ordering::Relaxed),
            in_flight: shared.in_flight.load(Ordering::Relaxed),
            handled_total: shared.handled_total.load(Ordering::Relaxed),
            completed_total: shared.completed_total.load(Ordering::Relaxed),
            failed_total: shared.failed_total.load(Ordering::Relaxed),
            skipped_total: shared.skipped_total.load(Ordering::Relaxed),
        }
    }

    fn spawn_event_loop(&self, mut events: broadcast::Receiver<ArtifactEvent>) {
        let shared = Arc::clone(&self.shared);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Job event loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Job event loop received shutdown signal");
                        break;
                    }
                    event = events.recv() => match event {
                        Ok(event) if event.container == Container::Input => {
                            dispatch(&shared, event.name);
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Missed artifact events, rescanning input container");
                            rescan(&shared).await;
                        }
                        Err(RecvError::Closed) => {
                            warn!("Artifact event channel closed");
                            break;
                        }
                    }
                }
            }
            info!("Job event loop stopped");
        });
    }
}

/// Spawns a job for `name`, gated by the concurrency permits.
fn dispatch(shared: &Arc<Shared>, name: String) {
    let shared = Arc::clone(shared);

    tokio::spawn(async move {
        let Ok(_permit) = Arc::clone(&shared.permits).acquire_owned().await else {
            return;
        };
        // Left in the input container; recovery picks it up next start.
        if !shared.running.load(Ordering::Relaxed) {
            debug!(artifact = %name, "Runner stopped, not starting job");
            return;
        }

        shared.in_flight.fetch_add(1, Ordering::Relaxed);
        let result = shared.orchestrator.handle_artifact(&name).await;
        shared.in_flight.fetch_sub(1, Ordering::Relaxed);

        if let Err(e) = &result {
            error!(artifact = %name, error = %e, "Job handling failed");
        }
        shared.record(&result);
    });
}

/// Re-drives input artifacts whose job is not terminal.
///
/// Inputs of completed jobs are leftovers from a failed cleanup and are
/// deleted; inputs of failed jobs are kept. Returns the number of jobs
/// dispatched.
async fn rescan(shared: &Arc<Shared>) -> usize {
    let orchestrator = &shared.orchestrator;
    let names = match orchestrator.store().list(Container::Input).await {
        Ok(names) => names,
        Err(e) => {
            error!(error = %e, "Failed to list input artifacts");
            return 0;
        }
    };

    let mut dispatched = 0;
    for name in names {
        let Some(job_id) = job_id_from_artifact(&name) else {
            continue;
        };

        let record = match orchestrator.ledger().get(orchestrator.partition(), job_id) {
            Ok(fields) => fields.map(|f| JobRecord::from_fields(job_id, &f)),
            Err(e) => {
                warn!(artifact = %name, error = %e, "Failed to read job during rescan");
                continue;
            }
        };

        match record.map(|r| r.status) {
            Some(status) if status.is_terminal() => {
                if status == JobStatus::Completed {
                    match orchestrator.store().delete(Container::Input, &name).await {
                        Ok(_) => debug!(artifact = %name, "Deleted leftover input of completed job"),
                        Err(e) => warn!(artifact = %name, error = %e, "Failed to delete leftover input"),
                    }
                }
            }
            _ => {
                dispatch(shared, name);
                dispatched += 1;
            }
        }
    }
    dispatched
}
