//! Artifact store trait definition.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use tokio::sync::broadcast;

use super::error::ArtifactError;
use super::types::{ArtifactEvent, ArtifactMetadata, ArtifactReader, Container};

/// Blob storage for job inputs and outputs.
///
/// Implementations must publish an [`ArtifactEvent`] for every artifact
/// written to [`Container::Input`], after both content and metadata are
/// readable.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Returns the configured name of a container.
    fn container_name(&self, container: Container) -> &str;

    /// Stores an artifact, replacing any existing one with the same name.
    async fn put(
        &self,
        container: Container,
        name: &str,
        data: Bytes,
        metadata: ArtifactMetadata,
    ) -> Result<(), ArtifactError>;

    /// Stores the content of a local file as an artifact.
    ///
    /// The default implementation reads the whole file into memory.
    async fn put_file(
        &self,
        container: Container,
        name: &str,
        path: &Path,
        metadata: ArtifactMetadata,
    ) -> Result<(), ArtifactError> {
        let data = tokio::fs::read(path).await?;
        self.put(container, name, Bytes::from(data), metadata).await
    }

    /// Opens an artifact for reading.
    async fn get_stream(
        &self,
        container: Container,
        name: &str,
    ) -> Result<ArtifactReader, ArtifactError>;

    /// Reads the metadata map of an artifact.
    async fn get_metadata(
        &self,
        container: Container,
        name: &str,
    ) -> Result<ArtifactMetadata, ArtifactError>;

    /// Replaces the metadata map of an existing artifact.
    async fn set_metadata(
        &self,
        container: Container,
        name: &str,
        metadata: ArtifactMetadata,
    ) -> Result<(), ArtifactError>;

    /// Deletes an artifact. Returns `false` if it was already absent.
    async fn delete(&self, container: Container, name: &str) -> Result<bool, ArtifactError>;

    /// Checks whether an artifact exists.
    async fn exists(&self, container: Container, name: &str) -> Result<bool, ArtifactError>;

    /// Lists artifact names in a container, sorted.
    async fn list(&self, container: Container) -> Result<Vec<String>, ArtifactError>;

    /// Returns the public URL of an artifact.
    fn url(&self, container: Container, name: &str) -> String;

    /// Subscribes to artifact write events.
    fn subscribe(&self) -> broadcast::Receiver<ArtifactEvent>;
}
