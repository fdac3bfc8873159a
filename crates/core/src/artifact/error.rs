//! Error types for the artifact module.

use thiserror::Error;

use super::types::Container;

/// Errors that can occur while reading or writing artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The requested artifact does not exist.
    #[error("Artifact not found: {container}/{name}")]
    NotFound { container: Container, name: String },

    /// The artifact name cannot be used as an object key.
    #[error("Invalid artifact name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// The metadata sidecar is unreadable.
    #[error("Corrupt metadata for {name}: {reason}")]
    Metadata { name: String, reason: String },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArtifactError {
    /// Creates a not-found error.
    pub fn not_found(container: Container, name: impl Into<String>) -> Self {
        Self::NotFound {
            container,
            name: name.into(),
        }
    }

    /// Creates an invalid-name error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the artifact is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
