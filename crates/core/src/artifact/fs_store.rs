//! File system artifact store.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/<container>/<name>                    artifact content
//! <root>/<container>/.meta/<name>.meta.json    metadata sidecar
//! ```
//!
//! Writes go to a hidden temporary file first and are renamed into place,
//! so readers never observe a partially written artifact.

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::ArtifactError;
use super::traits::ArtifactStore;
use super::types::{
    validate_artifact_name, ArtifactEvent, ArtifactMetadata, ArtifactReader, Container,
};
use crate::config::StorageConfig;

const METADATA_DIR: &str = ".meta";
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Artifact store backed by a local directory tree.
pub struct FsArtifactStore {
    root: PathBuf,
    input_container: String,
    output_container: String,
    public_base_url: String,
    events: broadcast::Sender<ArtifactEvent>,
}

impl FsArtifactStore {
    /// Opens the store, creating container directories as needed.
    pub async fn open(config: &StorageConfig) -> Result<Self, ArtifactError> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = Self {
            root: config.root.clone(),
            input_container: config.input_container.clone(),
            output_container: config.output_container.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            events,
        };

        for container in [Container::Input, Container::Output] {
            fs::create_dir_all(store.container_dir(container).join(METADATA_DIR)).await?;
        }

        Ok(store)
    }

    /// Returns the directory backing a container.
    pub fn container_dir(&self, container: Container) -> PathBuf {
        self.root.join(self.container_name(container))
    }

    fn object_path(&self, container: Container, name: &str) -> Result<PathBuf, ArtifactError> {
        validate_artifact_name(name)?;
        Ok(self.container_dir(container).join(name))
    }

    fn metadata_path(&self, container: Container, name: &str) -> PathBuf {
        self.container_dir(container)
            .join(METADATA_DIR)
            .join(format!("{}.meta.json", name))
    }

    fn temp_path(&self, container: Container) -> PathBuf {
        self.container_dir(container)
            .join(format!(".tmp-{}", Uuid::new_v4()))
    }

    async fn write_atomic(
        &self,
        container: Container,
        destination: &Path,
        data: &[u8],
    ) -> Result<(), ArtifactError> {
        let temp = self.temp_path(container);
        let result = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            fs::rename(&temp, destination).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn write_metadata(
        &self,
        container: Container,
        name: &str,
        metadata: &ArtifactMetadata,
    ) -> Result<(), ArtifactError> {
        let json = serde_json::to_vec(metadata).map_err(|e| ArtifactError::Metadata {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.write_atomic(container, &self.metadata_path(container, name), &json)
            .await
    }

    fn publish(&self, container: Container, name: &str) {
        if container != Container::Input {
            return;
        }
        // No subscribers is fine: recovery picks the artifact up on next start.
        let receivers = self
            .events
            .send(ArtifactEvent {
                container,
                name: name.to_string(),
            })
            .unwrap_or(0);
        debug!(name = %name, receivers, "Published artifact event");
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn container_name(&self, container: Container) -> &str {
        match container {
            Container::Input => &self.input_container,
            Container::Output => &self.output_container,
        }
    }

    async fn put(
        &self,
        container: Container,
        name: &str,
        data: Bytes,
        metadata: ArtifactMetadata,
    ) -> Result<(), ArtifactError> {
        let path = self.object_path(container, name)?;
        self.write_metadata(container, name, &metadata).await?;
        self.write_atomic(container, &path, &data).await?;

        debug!(container = %container, name = %name, size = data.len(), "Stored artifact");
        self.publish(container, name);
        Ok(())
    }

    async fn put_file(
        &self,
        container: Container,
        name: &str,
        path: &Path,
        metadata: ArtifactMetadata,
    ) -> Result<(), ArtifactError> {
        let destination = self.object_path(container, name)?;
        self.write_metadata(container, name, &metadata).await?;

        let temp = self.temp_path(container);
        let result = async {
            fs::copy(path, &temp).await?;
            fs::rename(&temp, &destination).await
        }
        .await;
        if let Err(e) = result {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(container = %container, name = %name, source = %path.display(), "Stored artifact from file");
        self.publish(container, name);
        Ok(())
    }

    async fn get_stream(
        &self,
        container: Container,
        name: &str,
    ) -> Result<ArtifactReader, ArtifactError> {
        let path = self.object_path(container, name)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ArtifactError::not_found(container, name))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_metadata(
        &self,
        container: Container,
        name: &str,
    ) -> Result<ArtifactMetadata, ArtifactError> {
        let path = self.object_path(container, name)?;
        if !fs::try_exists(&path).await? {
            return Err(ArtifactError::not_found(container, name));
        }

        match fs::read(self.metadata_path(container, name)).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| ArtifactError::Metadata {
                name: name.to_string(),
                reason: e.to_string(),
            }),
            // Artifacts copied in by hand have no sidecar.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ArtifactMetadata::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_metadata(
        &self,
        container: Container,
        name: &str,
        metadata: ArtifactMetadata,
    ) -> Result<(), ArtifactError> {
        let path = self.object_path(container, name)?;
        if !fs::try_exists(&path).await? {
            return Err(ArtifactError::not_found(container, name));
        }
        self.write_metadata(container, name, &metadata).await
    }

    async fn delete(&self, container: Container, name: &str) -> Result<bool, ArtifactError> {
        let path = self.object_path(container, name)?;
        let removed = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = fs::remove_file(self.metadata_path(container, name)).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(name = %name, error = %e, "Failed to remove metadata sidecar");
            }
        }

        Ok(removed)
    }

    async fn exists(&self, container: Container, name: &str) -> Result<bool, ArtifactError> {
        let path = self.object_path(container, name)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn list(&self, container: Container) -> Result<Vec<String>, ArtifactError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(self.container_dir(container)).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    fn url(&self, container: Container, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url,
            self.container_name(container),
            urlencoding::encode(name)
        )
    }

    fn subscribe(&self) -> broadcast::Receiver<ArtifactEvent> {
        self.events.subscribe()
    }
}
