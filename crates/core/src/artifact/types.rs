//! Types for the artifact module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::io::AsyncRead;

use super::error::ArtifactError;

/// Flat string-to-string metadata attached to an artifact.
pub type ArtifactMetadata = BTreeMap<String, String>;

/// Readable byte stream of an artifact's content.
pub type ArtifactReader = Box<dyn AsyncRead + Send + Unpin>;

/// Well-known metadata keys written at submission time.
pub mod metadata_keys {
    /// Operation requested for the job.
    pub const OPERATION: &str = "operation";
    /// Processor-specific parameters.
    pub const PARAMS: &str = "params";
    /// Name of the file as uploaded by the client.
    pub const ORIGINAL_FILENAME: &str = "original_filename";
}

/// The two logical containers of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    /// Uploaded files waiting to be processed.
    Input,
    /// Results produced by processors.
    Output,
}

impl Container {
    pub fn as_str(&self) -> &'static str {
        match self {
            Container::Input => "input",
            Container::Output => "output",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification that an artifact was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEvent {
    pub container: Container,
    pub name: String,
}

/// Rejects names that could escape their container or collide with
/// store-internal files.
pub fn validate_artifact_name(name: &str) -> Result<(), ArtifactError> {
    if name.is_empty() {
        return Err(ArtifactError::invalid_name(name, "name is empty"));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(ArtifactError::invalid_name(
            name,
            "name contains a path separator",
        ));
    }
    if name.starts_with('.') {
        return Err(ArtifactError::invalid_name(name, "name starts with a dot"));
    }
    Ok(())
}

/// Derives the job id from an input artifact name.
///
/// Any leading path is dropped, then the last extension is stripped:
/// `input-files/3f2a.png` becomes `3f2a`. Returns `None` when nothing is left.
pub fn job_id_from_artifact(name: &str) -> Option<&str> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(idx) => &file_name[..idx],
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_strips_extension() {
        assert_eq!(job_id_from_artifact("abc-123.png"), Some("abc-123"));
        assert_eq!(job_id_from_artifact("abc-123"), Some("abc-123"));
    }

    #[test]
    fn test_job_id_strips_only_last_extension() {
        assert_eq!(job_id_from_artifact("bundle.tar.gz"), Some("bundle.tar"));
    }

    #[test]
    fn test_job_id_drops_container_prefix() {
        assert_eq!(
            job_id_from_artifact("input-files/0d6c.mp4"),
            Some("0d6c")
        );
    }

    #[test]
    fn test_job_id_empty() {
        assert_eq!(job_id_from_artifact(""), None);
        assert_eq!(job_id_from_artifact("input-files/"), None);
    }

    #[test]
    fn test_validate_artifact_name() {
        assert!(validate_artifact_name("job.png").is_ok());
        assert!(validate_artifact_name("").is_err());
        assert!(validate_artifact_name("../etc/passwd").is_err());
        assert!(validate_artifact_name(".meta").is_err());
        assert!(validate_artifact_name("a\\b").is_err());
    }

    #[test]
    fn test_container_serialization() {
        let json = serde_json::to_string(&Container::Output).unwrap();
        assert_eq!(json, "\"output\"");
    }
}
