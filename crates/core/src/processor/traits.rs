//! Trait definitions for the processor module.

use async_trait::async_trait;

use super::error::ProcessorError;
use super::sink::OutputSink;
use super::types::{MatchRule, ProcessOutput, ProcessRequest};

/// A transformation capability for a family of operations.
///
/// Processors hold no per-job state and may run concurrently for distinct
/// jobs. Each one dispatches on the exact operation name it receives.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Returns the name of this processor implementation.
    fn name(&self) -> &str;

    /// Operation names this processor wants routed to it.
    fn routes(&self) -> Vec<MatchRule>;

    /// Exact operation names this processor implements.
    ///
    /// Prefix routes accept any suffix; only these names are reported as
    /// metric labels.
    fn operations(&self) -> &[&'static str] {
        &[]
    }

    /// Transforms the request input and writes results through `sink`.
    async fn process(
        &self,
        request: ProcessRequest,
        sink: &OutputSink,
    ) -> Result<ProcessOutput, ProcessorError>;

    /// Validates that required external tools are available.
    async fn validate(&self) -> Result<(), ProcessorError> {
        Ok(())
    }
}
