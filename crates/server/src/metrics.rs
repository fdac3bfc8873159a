//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the transmute server:
//! - HTTP request metrics (latency, counts, errors)
//! - Upload metrics
//! - Job runner and ledger status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use regex_lite::Regex;
use transmute_core::{JobFilter, JobStatus};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transmute_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transmute_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "transmute_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Upload Metrics
// =============================================================================

/// Jobs accepted through the upload endpoint.
pub static UPLOADS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("transmute_uploads_total", "Total jobs submitted by upload").unwrap()
});

/// Size of accepted uploads in bytes.
pub static UPLOAD_BYTES: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("transmute_upload_bytes", "Size of uploaded files").buckets(vec![
            1e3, 1e4, 1e5, 1e6, 1e7, 5e7, 1e8,
        ]),
    )
    .unwrap()
});

// =============================================================================
// Runner Status (collected dynamically)
// =============================================================================

/// Whether the job runner is running (1) or not (0).
pub static RUNNER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "transmute_runner_running",
        "Whether the job runner is running",
    )
    .unwrap()
});

/// Jobs currently being processed.
pub static JOBS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("transmute_jobs_in_flight", "Jobs currently being processed").unwrap()
});

/// Jobs in the ledger by status.
pub static JOBS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("transmute_jobs_by_status", "Number of jobs in each status"),
        &["status"],
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Uploads
    registry.register(Box::new(UPLOADS_TOTAL.clone())).unwrap();
    registry.register(Box::new(UPLOAD_BYTES.clone())).unwrap();

    // Runner
    registry.register(Box::new(RUNNER_RUNNING.clone())).unwrap();
    registry.register(Box::new(JOBS_IN_FLIGHT.clone())).unwrap();
    registry.register(Box::new(JOBS_BY_STATUS.clone())).unwrap();

    // Core metrics (orchestrator, ledger, shortener)
    transmute_core::metrics::register_metrics(registry).unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the runner and ledger as they
/// are now.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    match state.runner() {
        Some(runner) => {
            let status = runner.status();
            RUNNER_RUNNING.set(if status.running { 1 } else { 0 });
            JOBS_IN_FLIGHT.set(status.in_flight as i64);
        }
        None => {
            RUNNER_RUNNING.set(0);
            JOBS_IN_FLIGHT.set(0);
        }
    }

    for status in JobStatus::all() {
        let filter = JobFilter::new().with_status(status);
        if let Ok(count) = state.ledger().count(state.partition(), &filter) {
            JOBS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count);
        }
    }
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
///
/// Served files collapse to their container so every output artifact does
/// not get its own label.
pub fn normalize_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("/files/") {
        let container = rest.split('/').next().unwrap_or_default();
        return format!("/files/{}/{{name}}", container);
    }

    let result = UUID_RE.replace_all(path, "{id}");
    let result = NUMERIC_RE.replace_all(&result, "/{id}$1");
    result.to_string()
}
