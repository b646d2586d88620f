//! Local filesystem backend. Blocks are emulated with staged files.

use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use snafu::prelude::*;
use std::sync::Arc;

use crate::error::{CreateRootSnafu, ObjectStoreSnafu, StorageError};

use super::{BackendConfig, StorageProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    /// Absolute directory used as the storage root.
    pub path: String,
}

impl StorageProvider {
    pub(super) async fn construct_local(config: LocalConfig) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&config.path)
            .await
            .context(CreateRootSnafu {
                path: config.path.as_str(),
            })?;
        let root = LocalFileSystem::new_with_prefix(&config.path).context(ObjectStoreSnafu)?;

        Ok(Self {
            canonical_url: format!("file://{}", config.path),
            config: BackendConfig::Local(config),
            object_store: Arc::new(root) as Arc<dyn ObjectStore>,
            block_store: None,
        })
    }
}
