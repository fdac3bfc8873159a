use std::sync::Arc;
use transmute_core::{
    ArtifactStore, Config, JobLedger, JobRunner, JobSubmitter, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn ArtifactStore>,
    ledger: Arc<dyn JobLedger>,
    submitter: JobSubmitter,
    runner: Option<Arc<JobRunner>>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ArtifactStore>,
        ledger: Arc<dyn JobLedger>,
        runner: Option<Arc<JobRunner>>,
    ) -> Self {
        let submitter = JobSubmitter::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            config.ledger.partition.clone(),
        );
        Self {
            config,
            store,
            ledger,
            submitter,
            runner,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Partition holding the job rows.
    pub fn partition(&self) -> &str {
        &self.config.ledger.partition
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn ledger(&self) -> &dyn JobLedger {
        self.ledger.as_ref()
    }

    pub fn submitter(&self) -> &JobSubmitter {
        &self.submitter
    }

    /// The job runner, if enabled.
    pub fn runner(&self) -> Option<&Arc<JobRunner>> {
        self.runner.as_ref()
    }
}
