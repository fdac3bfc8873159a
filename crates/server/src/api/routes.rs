use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::{handlers, jobs, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let storage = &state.config().storage;
    let output_dir = storage.root.join(&storage.output_container);
    let files_path = format!("/files/{}", storage.output_container);
    let body_limit = state.config().server.max_upload_bytes;

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Jobs
        .route(
            "/jobs",
            get(jobs::list_jobs_handler).post(jobs::create_job),
        )
        .route("/jobs/{id}", get(jobs::get_job))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(Arc::clone(&state));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics).with_state(state))
        // Output artifacts, so output URLs resolve
        .nest_service(&files_path, ServeDir::new(output_dir))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(trace_layer)
        .layer(cors)
}
