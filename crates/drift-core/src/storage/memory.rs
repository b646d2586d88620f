//! In-memory storage backend, used for dry runs and tests.

use object_store::ObjectStore;
use object_store::memory::InMemory;
use object_store::multipart::MultipartStore;
use object_store::path::Path;
use std::sync::Arc;

use super::{BackendConfig, StorageProvider};

/// In-memory store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    pub key: Option<Path>,
}

impl StorageProvider {
    pub(super) fn construct_memory(config: MemoryConfig) -> Self {
        let memory = Arc::new(InMemory::new());
        let block_store: Option<Arc<dyn MultipartStore>> = Some(memory.clone());
        let object_store: Arc<dyn ObjectStore> = memory;

        let canonical_url = match &config.key {
            Some(key) => format!("memory://{key}"),
            None => "memory://".to_string(),
        };

        Self {
            config: BackendConfig::Memory(config),
            object_store,
            block_store,
            canonical_url,
        }
    }

    /// Create an empty in-memory provider with no key prefix.
    ///
    /// Clones share the same underlying store.
    pub fn in_memory() -> Self {
        Self::construct_memory(MemoryConfig { key: None })
    }
}
