//! Multi-cloud storage abstraction.
//!
//! Provides a unified interface for working with S3, GCS, Azure Blob Storage,
//! the local filesystem and an in-memory store. Paths passed to a
//! `StorageProvider` are relative to the key prefix of its URL.

mod azure;
mod blocks;
mod gcs;
mod local;
mod memory;
mod s3;
mod url_parser;

pub use blocks::ObjectUpload;
pub use url_parser::BackendConfig;

use bytes::Bytes;
use futures::StreamExt;
use object_store::multipart::MultipartStore;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::emit;
use crate::error::{ObjectStoreSnafu, StorageError};
use crate::metrics::events::{
    RequestStatus, StorageOperation, StorageRequest, StorageRequestDuration,
};

// Re-export config types
pub use azure::AzureConfig;
pub use gcs::GcsConfig;
pub use local::LocalConfig;
pub use memory::MemoryConfig;
pub use s3::S3Config;

/// Shared handle to a provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// One storage root (bucket, container or directory plus optional key
/// prefix) behind a single object-store interface.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    /// Native staged-block API. Only set for backends that accept blocks of
    /// any size and commit them from an explicit ordered list (Azure block
    /// blobs, in-memory).
    pub(crate) block_store: Option<Arc<dyn MultipartStore>>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

/// Append the key prefix, if any, to a backend's base URL.
fn url_with_key(base: String, key: Option<&Path>) -> String {
    match key {
        Some(key) => format!("{base}/{key}"),
        None => base,
    }
}

/// Record request count and latency for one storage call.
fn record<T, E>(operation: StorageOperation, start: Instant, result: &Result<T, E>) {
    emit!(StorageRequest {
        operation,
        status: RequestStatus::of(result),
    });
    emit!(StorageRequestDuration {
        operation,
        duration: start.elapsed(),
    });
}

impl StorageProvider {
    /// Build a provider from a storage URL plus backend options (credentials,
    /// region and so on).
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        match BackendConfig::parse_url(url)? {
            BackendConfig::S3(config) => Self::construct_s3(config, options).await,
            BackendConfig::Gcs(config) => Self::construct_gcs(config, options).await,
            BackendConfig::Azure(config) => Self::construct_azure(config, options).await,
            BackendConfig::Local(config) => Self::construct_local(config).await,
            BackendConfig::Memory(config) => Ok(Self::construct_memory(config)),
        }
    }

    /// Canonical URL of the storage root, for logging.
    pub fn url(&self) -> &str {
        &self.canonical_url
    }

    /// Whether this backend stages blocks natively.
    pub fn supports_native_blocks(&self) -> bool {
        self.block_store.is_some()
    }

    /// Prepend the URL's key prefix, if any, to `path`.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// Fetch an object's full contents.
    pub async fn get(&self, path: impl Into<Path>) -> Result<Bytes, StorageError> {
        let path = path.into();
        let start = Instant::now();
        let result = match self.object_store.get(&self.qualify_path(&path)).await {
            Ok(get) => get.bytes().await,
            Err(e) => Err(e),
        };
        record(StorageOperation::Get, start, &result);

        result.context(ObjectStoreSnafu)
    }

    /// Create or overwrite a file with the given bytes.
    pub async fn put(&self, path: &Path, bytes: Bytes) -> Result<(), StorageError> {
        self.put_payload(path, PutPayload::from(bytes)).await
    }

    /// Write a payload as a single request.
    pub async fn put_payload(&self, path: &Path, payload: PutPayload) -> Result<(), StorageError> {
        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self.object_store.put(&path, payload).await;
        record(StorageOperation::Put, start, &result);

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Remove an object. Missing objects are an error on most backends.
    pub async fn delete(&self, path: &Path) -> Result<(), StorageError> {
        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self.object_store.delete(&path).await;
        record(StorageOperation::Delete, start, &result);

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Verify that the storage root can be listed with the configured
    /// credentials.
    pub async fn check_reachable(&self) -> Result<(), StorageError> {
        let start = Instant::now();
        let result = self.object_store.list_with_delimiter(self.config.key()).await;
        record(StorageOperation::List, start, &result);

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// List files whose name ends with `extension` (case-insensitive).
    ///
    /// `prefix` is a plain string prefix on the relative path, so `sales_`
    /// matches `sales_2024.csv` as well as `sales_/jan.csv`. Only the
    /// directory part of the prefix is used to narrow the listing request.
    /// Returns paths relative to the configured key prefix, sorted.
    pub async fn list_files_with_extension(
        &self,
        prefix: Option<&str>,
        extension: &str,
    ) -> Result<Vec<String>, StorageError> {
        let prefix = prefix.unwrap_or_default();
        let extension = extension.to_ascii_lowercase();

        let listing_dir = prefix.rfind('/').map(|idx| Path::from(&prefix[..idx]));
        let base: Option<Path> = match (self.config.key(), &listing_dir) {
            (Some(key), Some(dir)) => Some(key.parts().chain(dir.parts()).collect()),
            (Some(key), None) => Some(key.clone()),
            (None, dir) => dir.clone(),
        };
        let key_part_count = self
            .config
            .key()
            .map(|key| key.parts().count())
            .unwrap_or_default();

        let start = Instant::now();
        let mut stream = self.object_store.list(base.as_ref());
        let mut files = Vec::new();
        let mut total_listed = 0usize;

        while let Some(meta) = stream.next().await {
            let meta = match meta {
                Ok(meta) => meta,
                Err(e) => {
                    record::<(), ()>(StorageOperation::List, start, &Err(()));
                    return Err(StorageError::ObjectStore { source: e });
                }
            };
            total_listed += 1;

            let relative: Path = meta.location.parts().skip(key_part_count).collect();
            let relative = relative.to_string();
            if relative.starts_with(prefix) && relative.to_ascii_lowercase().ends_with(&extension)
            {
                files.push(relative);
            }
        }
        record::<(), ()>(StorageOperation::List, start, &Ok(()));

        debug!(
            "Listed {} total files under {}, {} match '{}'",
            total_listed,
            self.canonical_url,
            files.len(),
            extension
        );

        files.sort();
        Ok(files)
    }
}
