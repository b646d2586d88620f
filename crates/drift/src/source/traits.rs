//! Traits for source stores.
//!
//! The merge engine fetches sources only through `SourceStore`, so tests can
//! substitute stores that fail or record which sources were read.

use async_trait::async_trait;
use bytes::Bytes;

use drift_core::StorageProvider;

use crate::error::StorageError;

/// A store that serves whole source objects by reference.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Fetch the full contents of one source.
    async fn read(&self, source_ref: &str) -> Result<Bytes, StorageError>;
}

#[async_trait]
impl SourceStore for StorageProvider {
    async fn read(&self, source_ref: &str) -> Result<Bytes, StorageError> {
        self.get(source_ref).await
    }
}
