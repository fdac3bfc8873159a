//! Common test utilities for in-process API testing.
//!
//! This module provides a test fixture that builds the router over a
//! filesystem artifact store and a SQLite ledger in a scratch directory,
//! optionally with a live job runner, so uploads are processed for real.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use transmute_core::config::{LedgerConfig, ServerConfig, StorageConfig};
use transmute_core::{
    ArtifactStore, Config, FsArtifactStore, JobLedger, JobOrchestrator, JobRunner,
    OrchestratorConfig, ProcessorRegistry, SqliteJobLedger,
};

/// Re-export fixtures for test convenience
pub use transmute_core::testing::fixtures;

/// Public base URL the fixture's store hands out.
pub const PUBLIC_BASE_URL: &str = "http://files.test/files";

const BOUNDARY: &str = "transmute-test-boundary";

/// Test fixture for API testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_upload() {
///     let fixture = TestFixture::with_runner().await;
///
///     let response = fixture
///         .upload("photo.png", &fixtures::png_image(4, 4), Some("img_to_bw"), None)
///         .await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Artifact store shared with the router
    pub store: Arc<FsArtifactStore>,
    /// Job ledger shared with the router
    pub ledger: Arc<SqliteJobLedger>,
    /// Job runner, when enabled
    pub runner: Option<Arc<JobRunner>>,
    /// Temporary directory for artifacts and the database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture without a runner: uploads stay pending.
    pub async fn new() -> Self {
        Self::build(false).await
    }

    /// Fixture with a running job runner and the default processors.
    pub async fn with_runner() -> Self {
        Self::build(true).await
    }

    async fn build(enable_runner: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
                max_upload_bytes: 10 * 1024 * 1024,
            },
            storage: StorageConfig {
                root: temp_dir.path().join("artifacts"),
                public_base_url: PUBLIC_BASE_URL.to_string(),
                ..Default::default()
            },
            ledger: LedgerConfig {
                path: temp_dir.path().join("test.db"),
                ..Default::default()
            },
            orchestrator: OrchestratorConfig {
                enabled: enable_runner,
                ..Default::default()
            },
            ..Default::default()
        };

        let store = Arc::new(
            FsArtifactStore::open(&config.storage)
                .await
                .expect("Failed to open artifact store"),
        );
        let ledger = Arc::new(
            SqliteJobLedger::new(&config.ledger.path).expect("Failed to create ledger"),
        );

        let runner = if enable_runner {
            let orchestrator = JobOrchestrator::new(
                config.orchestrator.clone(),
                config.ledger.partition.clone(),
                Arc::clone(&store) as Arc<dyn ArtifactStore>,
                Arc::clone(&ledger) as Arc<dyn JobLedger>,
                Arc::new(ProcessorRegistry::with_defaults(&config.tools)),
            );
            let runner = Arc::new(JobRunner::new(Arc::new(orchestrator)));
            runner.start().await;
            Some(runner)
        } else {
            None
        };

        let state = Arc::new(transmute_server::state::AppState::new(
            config,
            Arc::clone(&store) as Arc<dyn ArtifactStore>,
            Arc::clone(&ledger) as Arc<dyn JobLedger>,
            runner.clone(),
        ));

        let router = transmute_server::api::create_router(state);

        Self {
            router,
            store,
            ledger,
            runner,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a GET request and return the raw body.
    pub async fn get_bytes(&self, path: &str) -> (StatusCode, Bytes) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, body)
    }

    /// Upload a file as a multipart job submission.
    ///
    /// `operation` and `params` are omitted from the form when `None`.
    pub async fn upload(
        &self,
        file_name: &str,
        data: &[u8],
        operation: Option<&str>,
        params: Option<&str>,
    ) -> TestResponse {
        let mut fields = vec![MultipartField::File { file_name, data }];
        if let Some(operation) = operation {
            fields.push(MultipartField::Text {
                name: "operation",
                value: operation,
            });
        }
        if let Some(params) = params {
            fields.push(MultipartField::Text {
                name: "params",
                value: params,
            });
        }
        self.post_multipart("/api/v1/jobs", &fields).await
    }

    /// Send a multipart POST with the given fields.
    pub async fn post_multipart(&self, path: &str, fields: &[MultipartField<'_>]) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(fields)))
            .unwrap();
        self.send(request).await
    }

    /// Poll a job until it reaches a terminal status.
    pub async fn wait_for_terminal(&self, job_id: &str) -> TestResponse {
        let path = format!("/api/v1/jobs/{}", job_id);
        for _ in 0..200 {
            let response = self.get(&path).await;
            if matches!(response.body["status"].as_str(), Some("completed" | "failed")) {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job {} did not reach a terminal status", job_id);
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// A field of a multipart form.
pub enum MultipartField<'a> {
    File { file_name: &'a str, data: &'a [u8] },
    Text { name: &'a str, value: &'a str },
}

fn multipart_body(fields: &[MultipartField<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match field {
            MultipartField::File { file_name, data } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                        file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
                body.extend_from_slice(data);
            }
            MultipartField::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
