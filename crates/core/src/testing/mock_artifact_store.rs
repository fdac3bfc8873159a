//! Mock artifact store for testing.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::artifact::{
    validate_artifact_name, ArtifactError, ArtifactEvent, ArtifactMetadata, ArtifactReader,
    ArtifactStore, Container,
};

#[derive(Debug, Clone)]
struct StoredArtifact {
    data: Bytes,
    metadata: ArtifactMetadata,
}

/// In-memory implementation of the ArtifactStore trait.
///
/// Every `put` (in either container) is published as an event, so
/// consumers must filter on the container themselves.
///
/// # Example
///
/// ```rust,ignore
/// use transmute_core::testing::MockArtifactStore;
///
/// let store = MockArtifactStore::new();
/// store.put(Container::Input, "job.png", data, metadata).await?;
/// assert!(store.content(Container::Input, "job.png").is_some());
/// ```
#[derive(Debug)]
pub struct MockArtifactStore {
    objects: Arc<RwLock<HashMap<(Container, String), StoredArtifact>>>,
    events: broadcast::Sender<ArtifactEvent>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl Default for MockArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockArtifactStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            events,
            fail_puts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Content of an artifact, if present.
    pub fn content(&self, container: Container, name: &str) -> Option<Bytes> {
        self.objects
            .read()
            .unwrap()
            .get(&(container, name.to_string()))
            .map(|a| a.data.clone())
    }

    /// Number of artifacts in a container.
    pub fn count(&self, container: Container) -> usize {
        self.objects
            .read()
            .unwrap()
            .keys()
            .filter(|(c, _)| *c == container)
            .count()
    }

    /// Make every `put` fail with an I/O error.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every `delete` fail with an I/O error.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn injected(what: &str) -> ArtifactError {
        ArtifactError::Io(io::Error::other(format!("injected {} failure", what)))
    }
}

#[async_trait]
impl ArtifactStore for MockArtifactStore {
    fn name(&self) -> &str {
        "mock"
    }

    fn container_name(&self, container: Container) -> &str {
        container.as_str()
    }

    async fn put(
        &self,
        container: Container,
        name: &str,
        data: Bytes,
        metadata: ArtifactMetadata,
    ) -> Result<(), ArtifactError> {
        validate_artifact_name(name)?;
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Self::injected("put"));
        }

        self.objects
            .write()
            .unwrap()
            .insert((container, name.to_string()), StoredArtifact { data, metadata });

        let _ = self.events.send(ArtifactEvent {
            container,
            name: name.to_string(),
        });
        Ok(())
    }

    async fn get_stream(
        &self,
        container: Container,
        name: &str,
    ) -> Result<ArtifactReader, ArtifactError> {
        let data = self
            .content(container, name)
            .ok_or_else(|| ArtifactError::not_found(container, name))?;
        Ok(Box::new(io::Cursor::new(data)))
    }

    async fn get_metadata(
        &self,
        container: Container,
        name: &str,
    ) -> Result<ArtifactMetadata, ArtifactError> {
        self.objects
            .read()
            .unwrap()
            .get(&(container, name.to_string()))
            .map(|a| a.metadata.clone())
            .ok_or_else(|| ArtifactError::not_found(container, name))
    }

    async fn set_metadata(
        &self,
        container: Container,
        name: &str,
        metadata: ArtifactMetadata,
    ) -> Result<(), ArtifactError> {
        let mut objects = self.objects.write().unwrap();
        let artifact = objects
            .get_mut(&(container, name.to_string()))
            .ok_or_else(|| ArtifactError::not_found(container, name))?;
        artifact.metadata = metadata;
        Ok(())
    }

    async fn delete(&self, container: Container, name: &str) -> Result<bool, ArtifactError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected("delete"));
        }
        Ok(self
            .objects
            .write()
            .unwrap()
            .remove(&(container, name.to_string()))
            .is_some())
    }

    async fn exists(&self, container: Container, name: &str) -> Result<bool, ArtifactError> {
        Ok(self.content(container, name).is_some())
    }

    async fn list(&self, container: Container) -> Result<Vec<String>, ArtifactError> {
        let mut names: Vec<String> = self
            .objects
            .read()
            .unwrap()
            .keys()
            .filter(|(c, _)| *c == container)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn url(&self, container: Container, name: &str) -> String {
        format!("mock://{}/{}", container, name)
    }

    fn subscribe(&self) -> broadcast::Receiver<ArtifactEvent> {
        self.events.subscribe()
    }
}
