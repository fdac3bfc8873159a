//! Job orchestration: the core of the service.
//!
//! - [`JobOrchestrator`] drives one job from its input artifact to a
//!   terminal ledger row, at most once per job id in this process.
//! - [`JobRunner`] listens for new input artifacts and feeds them to the
//!   orchestrator with bounded concurrency, recovering leftovers on start.

mod config;
mod handler;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use handler::JobOrchestrator;
pub use runner::JobRunner;
pub use types::{truncate_message, JobError, JobOutcome, OrchestratorError, RunnerStatus, SkipReason};
