//! Error types for the processor module.

use std::path::PathBuf;
use thiserror::Error;

use crate::artifact::ArtifactError;

/// Errors that can occur while transforming an artifact.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// No registered processor matches the operation.
    #[error("Unknown operation: {operation}")]
    UnknownOperation { operation: String },

    /// The processor was routed an operation it does not implement.
    #[error("Operation {operation} is not supported by the {processor} processor")]
    UnsupportedOperation {
        processor: String,
        operation: String,
    },

    /// The input is unusable for the requested operation.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// External tool binary not found.
    #[error("{tool} not found at path: {path}")]
    ToolNotFound { tool: String, path: PathBuf },

    /// External tool exited unsuccessfully.
    #[error("{tool} failed: {reason}")]
    ToolFailed {
        tool: String,
        reason: String,
        stderr: Option<String>,
    },

    /// External tool exceeded its time budget.
    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: String, timeout_secs: u64 },

    /// Image decoding or encoding failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Writing an output artifact failed.
    #[error("Failed to store output: {0}")]
    Output(#[from] ArtifactError),

    /// A blocking worker panicked or was cancelled.
    #[error("Processing task aborted: {0}")]
    Task(String),

    /// I/O error on scratch files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessorError {
    pub fn unknown_operation(operation: impl Into<String>) -> Self {
        Self::UnknownOperation {
            operation: operation.into(),
        }
    }

    pub fn unsupported(processor: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            processor: processor.into(),
            operation: operation.into(),
        }
    }

    /// Creates a new invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates a new tool failure with captured stderr.
    pub fn tool_failed(
        tool: impl Into<String>,
        reason: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            reason: reason.into(),
            stderr,
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Io(_) => true,
            Self::Output(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<tokio::task::JoinError> for ProcessorError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

impl From<zip::result::ZipError> for ProcessorError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::invalid_input(format!("unreadable zip archive: {}", e))
    }
}
