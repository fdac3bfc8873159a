//! Job API tests against the in-process router.

mod common;

use axum::http::StatusCode;
use common::{fixtures, MultipartField, TestFixture, PUBLIC_BASE_URL};
use serde_json::json;

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_upload_returns_created_with_job_id() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .upload("photo.PNG", &fixtures::png_image(4, 4), Some("img_to_bw"), None)
        .await;

    assert_status!(response, StatusCode::CREATED);
    let job_id = response.body["job_id"].as_str().unwrap();
    assert_eq!(job_id.len(), 36);
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_multipart(
            "/api/v1/jobs",
            &[MultipartField::Text {
                name: "operation",
                value: "img_to_bw",
            }],
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("No file"));
}

#[tokio::test]
async fn test_upload_with_empty_file_name_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture.upload("", b"data", Some("img_to_bw"), None).await;

    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_without_operation_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .upload("photo.png", &fixtures::png_image(2, 2), None, None)
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("operation"));

    let list = fixture.get("/api/v1/jobs").await;
    assert_json_path!(list.body, "total", json!(0));
}

#[tokio::test]
async fn test_upload_writes_input_artifact() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .upload("Photo.JPG", b"jpeg-bytes", Some("img_to_sepia"), None)
        .await;
    assert_status!(response, StatusCode::CREATED);
    let job_id = response.body["job_id"].as_str().unwrap();

    let input = fixture
        .temp_dir
        .path()
        .join("artifacts")
        .join("input-files")
        .join(format!("{}.jpg", job_id));
    assert_eq!(std::fs::read(input).unwrap(), b"jpeg-bytes");
}

// =============================================================================
// Status lookup
// =============================================================================

#[tokio::test]
async fn test_get_unknown_job_is_pending() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/jobs/never-submitted").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "job_id", json!("never-submitted"));
    assert_json_path!(response.body, "status", json!("pending"));
    assert_json_path!(response.body, "known", json!(false));
}

#[tokio::test]
async fn test_get_submitted_job_without_runner_stays_pending() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .upload("photo.png", &fixtures::png_image(2, 2), Some("img_to_bw"), Some("x=1"))
        .await;
    let job_id = created.body["job_id"].as_str().unwrap();

    let response = fixture.get(&format!("/api/v1/jobs/{}", job_id)).await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("pending"));
    assert_json_path!(response.body, "known", json!(true));
    assert_json_path!(response.body, "operation", json!("img_to_bw"));
    assert_json_path!(response.body, "params", json!("x=1"));
    assert_json_path!(response.body, "original_filename", json!("photo.png"));
    assert!(response.body.get("output_url").is_none());
}

// =============================================================================
// Processing through the runner
// =============================================================================

#[tokio::test]
async fn test_upload_is_processed_and_output_served() {
    let fixture = TestFixture::with_runner().await;

    let created = fixture
        .upload("photo.png", &fixtures::png_image(8, 6), Some("img_to_bw"), None)
        .await;
    assert_status!(created, StatusCode::CREATED);
    let job_id = created.body["job_id"].as_str().unwrap().to_string();

    let response = fixture.wait_for_terminal(&job_id).await;
    assert_json_path!(response.body, "status", json!("completed"));

    let output_url = response.body["output_url"].as_str().unwrap();
    assert_eq!(
        output_url,
        format!("{}/output-files/{}_bw.png", PUBLIC_BASE_URL, job_id)
    );

    let path = output_url.strip_prefix("http://files.test").unwrap();
    let (status, body) = fixture.get_bytes(path).await;
    assert_eq!(status, StatusCode::OK);

    let img = image::load_from_memory(&body).unwrap();
    assert_eq!((img.width(), img.height()), (8, 6));
    assert_eq!(img.color(), image::ColorType::L8);
}

#[tokio::test]
async fn test_unknown_operation_fails_job() {
    let fixture = TestFixture::with_runner().await;

    let created = fixture
        .upload("notes.txt", b"hello", Some("bogus_op"), None)
        .await;
    let job_id = created.body["job_id"].as_str().unwrap().to_string();

    let response = fixture.wait_for_terminal(&job_id).await;

    assert_json_path!(response.body, "status", json!("failed"));
    assert!(response.body["error_message"]
        .as_str()
        .unwrap()
        .contains("bogus_op"));
    assert!(response.body.get("output_url").is_none());
}

#[tokio::test]
async fn test_missing_output_file_is_not_found() {
    let fixture = TestFixture::new().await;

    let (status, _) = fixture.get_bytes("/files/output-files/nothing.png").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_list_jobs_with_filters() {
    let fixture = TestFixture::new().await;

    for name in ["a.png", "b.png", "c.png"] {
        let response = fixture
            .upload(name, &fixtures::png_image(2, 2), Some("img_to_bw"), None)
            .await;
        assert_status!(response, StatusCode::CREATED);
    }

    let all = fixture.get("/api/v1/jobs").await;
    assert_status!(all, StatusCode::OK);
    assert_json_path!(all.body, "total", json!(3));
    assert_json_path!(all.body, "limit", json!(100));
    assert_eq!(all.body["jobs"].as_array().unwrap().len(), 3);

    let page = fixture.get("/api/v1/jobs?limit=2&offset=0").await;
    assert_eq!(page.body["jobs"].as_array().unwrap().len(), 2);
    assert_json_path!(page.body, "total", json!(3));

    let pending = fixture.get("/api/v1/jobs?status=pending").await;
    assert_json_path!(pending.body, "total", json!(3));

    let failed = fixture.get("/api/v1/jobs?status=failed").await;
    assert_json_path!(failed.body, "total", json!(0));
}

#[tokio::test]
async fn test_list_jobs_clamps_limit() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/jobs?limit=50000").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "limit", json!(1000));
}

#[tokio::test]
async fn test_list_jobs_invalid_status() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/jobs?status=exploded").await;

    assert_status!(response, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Health, config and metrics
// =============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::with_runner().await;

    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("ok"));
    assert_json_path!(response.body, "storage", json!("filesystem"));
    assert_json_path!(response.body, "runner", json!(true));
}

#[tokio::test]
async fn test_get_config() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body["storage"], "output_container", json!("output-files"));
    assert_json_path!(response.body["ledger"], "partition", json!("jobs"));
    assert_json_path!(response.body["shortener"], "enabled", json!(false));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_bytes("/metrics").await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("transmute_runner_running"));
    assert!(text.contains("transmute_jobs_by_status"));
}
