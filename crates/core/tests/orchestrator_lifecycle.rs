//! Orchestrator lifecycle integration tests.
//!
//! These tests drive real jobs through the filesystem store and the SQLite
//! ledger: submit -> pending -> processing -> completed | failed

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tempfile::TempDir;

use transmute_core::{
    config::StorageConfig,
    processor::ProcessorRegistry,
    testing::{fixtures, MockProcessor},
    ArtifactStore, Container, FsArtifactStore, JobLedger, JobOrchestrator, JobOutcome,
    JobRecord, JobRunner, JobStatus, JobSubmitter, JobView, OrchestratorConfig, SkipReason,
    SqliteJobLedger, ToolsConfig,
};

const PARTITION: &str = "jobs";

/// Test helper wiring the real store and ledger.
struct TestHarness {
    store: Arc<FsArtifactStore>,
    ledger: Arc<SqliteJobLedger>,
    tools: ToolsConfig,
    _temp_dir: TempDir,
}

impl TestHarness {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage = StorageConfig {
            root: temp_dir.path().join("artifacts"),
            public_base_url: "http://files.test".to_string(),
            ..Default::default()
        };

        let store = Arc::new(
            FsArtifactStore::open(&storage)
                .await
                .expect("Failed to open artifact store"),
        );
        let ledger = Arc::new(
            SqliteJobLedger::new(&temp_dir.path().join("ledger.db"))
                .expect("Failed to create ledger"),
        );
        let scratch = temp_dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).expect("Failed to create scratch dir");

        Self {
            store,
            ledger,
            tools: ToolsConfig::default().with_scratch_dir(scratch),
            _temp_dir: temp_dir,
        }
    }

    fn orchestrator(&self) -> JobOrchestrator {
        self.orchestrator_with(ProcessorRegistry::with_defaults(&self.tools))
    }

    fn orchestrator_with(&self, registry: ProcessorRegistry) -> JobOrchestrator {
        JobOrchestrator::new(
            OrchestratorConfig::default(),
            PARTITION,
            self.store.clone(),
            self.ledger.clone(),
            Arc::new(registry),
        )
    }

    fn submitter(&self) -> JobSubmitter {
        JobSubmitter::new(self.store.clone(), self.ledger.clone(), PARTITION)
    }

    fn record(&self, job_id: &str) -> JobRecord {
        let fields = self
            .ledger
            .get(PARTITION, job_id)
            .expect("ledger read")
            .expect("job row exists");
        JobRecord::from_fields(job_id, &fields)
    }

    async fn wait_for_terminal(&self, job_id: &str) -> JobRecord {
        for _ in 0..200 {
            if let Some(fields) = self.ledger.get(PARTITION, job_id).unwrap() {
                let record = JobRecord::from_fields(job_id, &fields);
                if record.status.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job {job_id} did not finish");
    }
}

#[tokio::test]
async fn test_img_to_bw_end_to_end() {
    let h = TestHarness::new().await;
    let job = h
        .submitter()
        .submit("cat.PNG", Bytes::from(fixtures::png_image(16, 9)), "img_to_bw", None)
        .await
        .unwrap();
    assert_eq!(h.record(&job.job_id).status, JobStatus::Pending);

    let outcome = h.orchestrator().handle_artifact(&job.artifact_name).await.unwrap();

    let expected_name = format!("{}_bw.png", job.job_id);
    match outcome {
        JobOutcome::Completed { output_url, .. } => {
            assert_eq!(output_url, format!("http://files.test/output-files/{}", expected_name));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let record = h.record(&job.job_id);
    assert_eq!(record.status, JobStatus::Completed);
    assert!(!record.output_url.unwrap().is_empty());
    assert_eq!(record.original_filename.as_deref(), Some("cat.PNG"));
    assert!(record.error_message.is_none());

    let output = std::fs::read(h.store.container_dir(Container::Output).join(&expected_name)).unwrap();
    let img = image::load_from_memory(&output).unwrap();
    assert_eq!(img.color(), image::ColorType::L8);
    assert_eq!((img.width(), img.height()), (16, 9));

    assert!(!h.store.exists(Container::Input, &job.artifact_name).await.unwrap());
}

#[tokio::test]
async fn test_merge_pdfs_without_pdfs_fails_and_keeps_input() {
    let h = TestHarness::new().await;
    let archive = fixtures::zip_archive(&[
        ("notes.txt", b"hello".as_slice()),
        ("cover.png", fixtures::png_image(2, 2).as_slice()),
    ]);
    let job = h
        .submitter()
        .submit("docs.zip", Bytes::from(archive), "merge_pdfs", None)
        .await
        .unwrap();

    let outcome = h.orchestrator().handle_artifact(&job.artifact_name).await.unwrap();

    assert!(matches!(outcome, JobOutcome::Failed { .. }));
    let record = h.record(&job.job_id);
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.error_message.unwrap().contains("no PDF files found"));
    assert!(record.output_url.is_none());
    assert!(h.store.exists(Container::Input, &job.artifact_name).await.unwrap());
}

#[tokio::test]
async fn test_bogus_operation_fails() {
    let h = TestHarness::new().await;
    let job = h
        .submitter()
        .submit("a.png", Bytes::from(fixtures::png_image(2, 2)), "bogus_op", None)
        .await
        .unwrap();

    h.orchestrator().handle_artifact(&job.artifact_name).await.unwrap();

    let record = h.record(&job.job_id);
    assert_eq!(record.status, JobStatus::Failed);
    let message = record.error_message.unwrap();
    assert!(message.contains("Unknown operation"));
    assert!(message.contains("bogus_op"));
    assert!(h.store.exists(Container::Input, &job.artifact_name).await.unwrap());
}

#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let h = TestHarness::new().await;
    let job = h
        .submitter()
        .submit("a.png", Bytes::from(fixtures::png_image(4, 4)), "img_to_sepia", None)
        .await
        .unwrap();
    let orchestrator = h.orchestrator();

    let first = orchestrator.handle_artifact(&job.artifact_name).await.unwrap();
    let after_first = h.record(&job.job_id);
    let second = orchestrator.handle_artifact(&job.artifact_name).await.unwrap();

    assert!(matches!(first, JobOutcome::Completed { .. }));
    assert_eq!(
        second,
        JobOutcome::Skipped {
            job_id: job.job_id.clone(),
            reason: SkipReason::AlreadyTerminal(JobStatus::Completed),
        }
    );
    assert_eq!(h.record(&job.job_id), after_first);
    assert_eq!(
        h.ledger
            .count(PARTITION, &transmute_core::JobFilter::new())
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_empty_result_fails() {
    let h = TestHarness::new().await;
    let registry = ProcessorRegistry::new().with(Arc::new(MockProcessor::new("mock").returning_empty()));
    let job = h
        .submitter()
        .submit("a.bin", Bytes::from_static(b"data"), "mock_nothing", None)
        .await
        .unwrap();

    h.orchestrator_with(registry)
        .handle_artifact(&job.artifact_name)
        .await
        .unwrap();

    let record = h.record(&job.job_id);
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.error_message.unwrap().contains("empty result"));
    assert!(h.store.exists(Container::Input, &job.artifact_name).await.unwrap());
}

#[tokio::test]
async fn test_status_of_unknown_job_is_pending() {
    let h = TestHarness::new().await;

    let view = h.orchestrator().lookup("never-submitted").unwrap();

    assert!(matches!(view, JobView::Unknown { .. }));
    assert_eq!(view.status(), JobStatus::Pending);
}

#[tokio::test]
async fn test_runner_processes_uploads_and_recovers() {
    let h = TestHarness::new().await;

    // Uploaded while no runner was listening.
    let early = h
        .submitter()
        .submit("early.png", Bytes::from(fixtures::png_image(3, 3)), "img_to_bw", None)
        .await
        .unwrap();

    let runner = JobRunner::new(Arc::new(h.orchestrator()));
    runner.start().await;

    let late = h
        .submitter()
        .submit("late.png", Bytes::from(fixtures::png_image(3, 3)), "img_to_sepia", None)
        .await
        .unwrap();

    let early_record = h.wait_for_terminal(&early.job_id).await;
    let late_record = h.wait_for_terminal(&late.job_id).await;
    runner.stop().await;

    assert_eq!(early_record.status, JobStatus::Completed);
    assert_eq!(late_record.status, JobStatus::Completed);
    assert!(h.store.list(Container::Input).await.unwrap().is_empty());

    let status = runner.status();
    assert!(!status.running);
    assert_eq!(status.completed_total, 2);
}
