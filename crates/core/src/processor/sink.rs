//! Output sink handed to processors.

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;

use super::error::ProcessorError;
use super::types::OutputLocator;
use crate::artifact::{ArtifactMetadata, ArtifactStore, Container};

/// Writes processor results into the output container.
#[derive(Clone)]
pub struct OutputSink {
    store: Arc<dyn ArtifactStore>,
}

impl OutputSink {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Stores an in-memory result.
    pub async fn put_bytes(
        &self,
        name: &str,
        data: impl Into<Bytes>,
    ) -> Result<OutputLocator, ProcessorError> {
        self.store
            .put(Container::Output, name, data.into(), ArtifactMetadata::new())
            .await?;
        Ok(self.locator(name))
    }

    /// Stores a result rendered to a scratch file.
    pub async fn put_file(&self, name: &str, path: &Path) -> Result<OutputLocator, ProcessorError> {
        self.store
            .put_file(Container::Output, name, path, ArtifactMetadata::new())
            .await?;
        Ok(self.locator(name))
    }

    fn locator(&self, name: &str) -> OutputLocator {
        OutputLocator {
            name: name.to_string(),
            url: self.store.url(Container::Output, name),
        }
    }
}
