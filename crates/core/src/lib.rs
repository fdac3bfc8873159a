pub mod artifact;
pub mod config;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod processor;
pub mod shortener;
pub mod submission;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use artifact::{
    ArtifactError, ArtifactEvent, ArtifactMetadata, ArtifactStore, Container, FsArtifactStore,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use job::{
    list_jobs, lookup_job, JobFilter, JobLedger, JobPage, JobRecord, JobStatus, JobView,
    LedgerError, SqliteJobLedger,
};
pub use orchestrator::{
    JobError, JobOrchestrator, JobOutcome, JobRunner, OrchestratorConfig, OrchestratorError,
    RunnerStatus, SkipReason,
};
pub use processor::{
    OutputLocator, OutputSink, ProcessOutput, ProcessRequest, Processor, ProcessorError,
    ProcessorRegistry, ToolsConfig,
};
pub use shortener::{ShortenerConfig, ShortenerError, TinyUrlShortener, UrlShortener};
pub use submission::{JobSubmitter, SubmitError, SubmittedJob};
