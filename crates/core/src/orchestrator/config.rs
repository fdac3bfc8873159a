//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the job orchestrator and its trigger loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Enable/disable the trigger loop.
    /// When disabled, uploads are accepted but stay pending.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum jobs processed at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Re-drive leftover input artifacts on start.
    #[serde(default = "default_recover_on_start")]
    pub recover_on_start: bool,

    /// Error messages longer than this (in characters) are truncated
    /// before they are written to the ledger.
    #[serde(default = "default_max_error_message_len")]
    pub max_error_message_len: usize,

    /// Extra attempts for a failed Completed/Failed ledger write.
    #[serde(default = "default_terminal_write_retries")]
    pub terminal_write_retries: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_recover_on_start() -> bool {
    true
}

fn default_max_error_message_len() -> usize {
    1024
}

fn default_terminal_write_retries() -> u32 {
    1
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            recover_on_start: default_recover_on_start(),
            max_error_message_len: default_max_error_message_len(),
            terminal_write_retries: default_terminal_write_retries(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    pub fn with_recover_on_start(mut self, recover: bool) -> Self {
        self.recover_on_start = recover;
        self
    }
}
