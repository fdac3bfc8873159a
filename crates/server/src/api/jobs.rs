//! Job API handlers: upload, status lookup and listing.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};
use transmute_core::{list_jobs, lookup_job, JobFilter, JobPage, JobStatus, SubmitError};

use crate::metrics::{UPLOADS_TOTAL, UPLOAD_BYTES};
use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by status
    pub status: Option<String>,
    /// Maximum number of jobs to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for an accepted upload
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Accept an upload and submit it as a job.
///
/// Multipart fields: `file` (required, with a file name), `operation`
/// (required) and `params` (optional).
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreateJobResponse>), impl IntoResponse> {
    let mut file_data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut operation: Option<String> = None;
    let mut params: Option<String> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                match field.bytes().await {
                    Ok(bytes) => file_data = Some(bytes),
                    Err(e) => {
                        return Err(error_response(
                            StatusCode::BAD_REQUEST,
                            format!("Failed to read file: {}", e),
                        ))
                    }
                }
            }
            "operation" => {
                if let Ok(text) = field.text().await {
                    operation = Some(text);
                }
            }
            "params" => {
                if let Ok(text) = field.text().await {
                    params = Some(text);
                }
            }
            _ => {}
        }
    }

    let data = match file_data {
        Some(data) => data,
        None => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "No file provided in multipart form",
            ))
        }
    };
    let file_name = match file_name.filter(|name| !name.trim().is_empty()) {
        Some(name) => name,
        None => return Err(error_response(StatusCode::BAD_REQUEST, "File name is empty")),
    };
    let operation = match operation.filter(|op| !op.trim().is_empty()) {
        Some(op) => op,
        None => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Missing 'operation' field",
            ))
        }
    };

    let size = data.len();
    match state
        .submitter()
        .submit(&file_name, data, &operation, params)
        .await
    {
        Ok(job) => {
            UPLOADS_TOTAL.inc();
            UPLOAD_BYTES.observe(size as f64);
            Ok((
                StatusCode::CREATED,
                Json(CreateJobResponse { job_id: job.job_id }),
            ))
        }
        Err(SubmitError::InvalidRequest(msg)) => {
            warn!(file_name = %file_name, "Rejected upload: {}", msg);
            Err(error_response(StatusCode::BAD_REQUEST, msg))
        }
        Err(e) => {
            error!(file_name = %file_name, operation = %operation, "Failed to submit job: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to submit job: {}", e),
            ))
        }
    }
}

/// Get a job's status by ID.
///
/// A job the ledger has no row for is reported as pending with
/// `"known": false`.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, impl IntoResponse> {
    let view = match lookup_job(state.ledger(), state.partition(), &id) {
        Ok(view) => view,
        Err(e) => {
            error!(job_id = %id, "Failed to look up job: {}", e);
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get job: {}", e),
            ));
        }
    };

    let known = view.is_known();
    let mut body = match serde_json::to_value(&view) {
        Ok(body) => body,
        Err(e) => {
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode job: {}", e),
            ))
        }
    };
    if let Value::Object(map) = &mut body {
        map.insert("known".to_string(), Value::Bool(known));
    }

    Ok(Json(body))
}

/// List jobs with optional status filter.
pub async fn list_jobs_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<JobPage>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = JobFilter::new().with_limit(limit).with_offset(offset);
    if let Some(status) = params.status.as_deref().filter(|s| !s.is_empty()) {
        match status.parse::<JobStatus>() {
            Ok(status) => filter = filter.with_status(status),
            Err(e) => return Err(error_response(StatusCode::BAD_REQUEST, e.to_string())),
        }
    }

    list_jobs(state.ledger(), state.partition(), &filter)
        .map(Json)
        .map_err(|e| {
            error!("Failed to list jobs: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to list jobs: {}", e),
            )
        })
}
