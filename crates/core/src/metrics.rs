//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (jobs started, outcomes, durations)
//! - Ledger terminal-write retries and input cleanup
//! - URL shortener results

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// =============================================================================
// Orchestrator - Job Metrics
// =============================================================================

/// Jobs picked up by the orchestrator.
pub static JOBS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "transmute_jobs_started_total",
        "Total jobs picked up by the orchestrator",
    )
    .unwrap()
});

/// Job outcomes by status.
pub static JOB_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transmute_job_outcomes_total", "Total job outcomes"),
        &["status"], // "completed", "failed", "skipped"
    )
    .unwrap()
});

/// Job duration in seconds, from pickup to terminal write.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transmute_job_duration_seconds",
            "Duration of a job from pickup to terminal state",
        )
        .buckets(vec![
            0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0,
        ]),
        &["operation", "status"],
    )
    .unwrap()
});

// =============================================================================
// Storage and ledger
// =============================================================================

/// Input artifacts that could not be deleted after completion.
pub static INPUT_CLEANUP_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "transmute_input_cleanup_failures_total",
        "Input artifacts left behind after a completed job",
    )
    .unwrap()
});

/// Retried terminal ledger writes.
pub static LEDGER_WRITE_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "transmute_ledger_write_retries_total",
        "Terminal ledger writes that needed a retry",
    )
    .unwrap()
});

// =============================================================================
// External services
// =============================================================================

/// URL shortener calls by result.
pub static SHORTENER_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "transmute_shortener_requests_total",
            "URL shortener requests by result",
        ),
        &["result"], // "ok", "error", "timeout"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_STARTED.clone()),
        Box::new(JOB_OUTCOMES.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(INPUT_CLEANUP_FAILURES.clone()),
        Box::new(LEDGER_WRITE_RETRIES.clone()),
        Box::new(SHORTENER_RESULTS.clone()),
    ]
}

/// Registers all core metrics in `registry`.
pub fn register_metrics(registry: &Registry) -> prometheus::Result<()> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}
