//! Artifact storage for job inputs and outputs.
//!
//! Artifacts are opaque byte blobs living in one of two logical containers:
//! [`Container::Input`] holds uploaded files waiting to be transformed and
//! [`Container::Output`] holds the results. Each artifact carries a flat
//! string-to-string metadata map; the submission side records the requested
//! operation there.
//!
//! Storing an artifact in the input container publishes an [`ArtifactEvent`]
//! to every subscriber. That event is the trigger the job runner reacts to.
//!
//! # Example
//!
//! ```ignore
//! use transmute_core::artifact::{ArtifactStore, Container, FsArtifactStore};
//!
//! let store = FsArtifactStore::open(&config.storage).await?;
//! let mut events = store.subscribe();
//!
//! store.put(Container::Input, "job-1.png", bytes, metadata).await?;
//! let event = events.recv().await?;
//! assert_eq!(event.name, "job-1.png");
//! ```

mod error;
mod fs_store;
mod traits;
mod types;

pub use error::ArtifactError;
pub use fs_store::FsArtifactStore;
pub use traits::ArtifactStore;
pub use types::{
    job_id_from_artifact, metadata_keys, validate_artifact_name, ArtifactEvent, ArtifactMetadata,
    ArtifactReader, Container,
};
