//! Types for the processor module.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::AsyncReadExt;

use super::error::ProcessorError;
use crate::artifact::ArtifactReader;

/// One invocation of a processor.
pub struct ProcessRequest {
    /// Exact operation name, e.g. `img_to_sepia`.
    pub operation: String,
    /// Base name for derived outputs (the job id).
    pub base_name: String,
    /// File name as uploaded, used for extension hints.
    pub original_name: String,
    /// Processor-specific parameters.
    pub params: Option<String>,
    /// Input content.
    pub input: ArtifactReader,
}

impl ProcessRequest {
    /// Reads the whole input into memory.
    pub async fn read_input(&mut self) -> Result<Vec<u8>, ProcessorError> {
        let mut data = Vec::new();
        self.input.read_to_end(&mut data).await?;
        Ok(data)
    }

    /// Lowercased extension of the original name, if any.
    pub fn input_extension(&self) -> Option<String> {
        std::path::Path::new(&self.original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

impl fmt::Debug for ProcessRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRequest")
            .field("operation", &self.operation)
            .field("base_name", &self.base_name)
            .field("original_name", &self.original_name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Where an output artifact was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLocator {
    /// Artifact name in the output container.
    pub name: String,
    /// Public URL of the artifact.
    pub url: String,
}

/// Result of a successful processor run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub outputs: Vec<OutputLocator>,
}

impl ProcessOutput {
    pub fn single(locator: OutputLocator) -> Self {
        Self {
            outputs: vec![locator],
        }
    }

    /// First output with a usable URL.
    pub fn primary(&self) -> Option<&OutputLocator> {
        self.outputs.iter().find(|o| !o.url.trim().is_empty())
    }
}

/// How an operation name is matched to a processor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchRule {
    Exact(String),
    Prefix(String),
}

impl MatchRule {
    pub fn exact(operation: impl Into<String>) -> Self {
        Self::Exact(operation.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    /// Match strength against `operation`, higher wins. Exact beats any prefix.
    pub fn score(&self, operation: &str) -> Option<usize> {
        match self {
            MatchRule::Exact(name) if name == operation => Some(usize::MAX),
            MatchRule::Prefix(prefix) if operation.starts_with(prefix.as_str()) => {
                Some(prefix.len())
            }
            _ => None,
        }
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchRule::Exact(name) => write!(f, "{}", name),
            MatchRule::Prefix(prefix) => write!(f, "{}*", prefix),
        }
    }
}
