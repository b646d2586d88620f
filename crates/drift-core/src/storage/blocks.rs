//! Staged-block and streamed multipart uploads.
//!
//! Two upload shapes are exposed:
//!
//! - **Native blocks** (`create_block_upload` / `put_block` /
//!   `complete_blocks`): each block is staged under an explicit index and the
//!   object is materialized from an ordered list of part ids. Only available
//!   when the backend has a block API without a minimum part size.
//! - **Streamed uploads** (`ObjectUpload`): bytes are pushed in order and
//!   buffered into multipart parts by `object_store`; works on every backend,
//!   including the local filesystem.

use bytes::Bytes;
use object_store::path::Path;
use object_store::{MultipartId, PutPayload, WriteMultipart};
use object_store::multipart::PartId;
use snafu::prelude::*;
use std::time::Instant;
use tracing::debug;

use crate::error::{BlocksUnsupportedSnafu, ObjectStoreSnafu, StorageError};
use crate::metrics::events::StorageOperation;

use super::{StorageProvider, record};

/// Number of parts an `ObjectUpload` keeps in flight before `put` waits.
const MAX_IN_FLIGHT_PARTS: usize = 2;

impl StorageProvider {
    /// Start a native block upload for `path`.
    pub async fn create_block_upload(&self, path: &Path) -> Result<MultipartId, StorageError> {
        let store = self.block_store.as_ref().context(BlocksUnsupportedSnafu {
            url: self.canonical_url.clone(),
        })?;
        let path = self.qualify_path(path);

        let start = Instant::now();
        let result = store.create_multipart(&path).await;
        record(StorageOperation::CreateMultipart, start, &result);

        result.context(ObjectStoreSnafu)
    }

    /// Stage one block under `index` for a native block upload.
    pub async fn put_block(
        &self,
        path: &Path,
        upload_id: &MultipartId,
        index: usize,
        payload: Bytes,
    ) -> Result<PartId, StorageError> {
        let store = self.block_store.as_ref().context(BlocksUnsupportedSnafu {
            url: self.canonical_url.clone(),
        })?;
        let path = self.qualify_path(path);

        let start = Instant::now();
        let result = store
            .put_part(&path, upload_id, index, PutPayload::from(payload))
            .await;
        record(StorageOperation::PutPart, start, &result);

        result.context(ObjectStoreSnafu)
    }

    /// Materialize the object from staged blocks, in the order of `parts`.
    pub async fn complete_blocks(
        &self,
        path: &Path,
        upload_id: &MultipartId,
        parts: Vec<PartId>,
    ) -> Result<(), StorageError> {
        let store = self.block_store.as_ref().context(BlocksUnsupportedSnafu {
            url: self.canonical_url.clone(),
        })?;
        let path = self.qualify_path(path);
        let part_count = parts.len();

        let start = Instant::now();
        let result = store.complete_multipart(&path, upload_id, parts).await;
        record(StorageOperation::CompleteMultipart, start, &result);

        result.context(ObjectStoreSnafu)?;
        debug!("Committed {part_count} blocks to {path}");
        Ok(())
    }

    /// Open a streamed multipart upload to `path`.
    pub async fn start_upload(&self, path: &Path) -> Result<ObjectUpload, StorageError> {
        let qualified = self.qualify_path(path).into_owned();

        let start = Instant::now();
        let result = self.object_store.put_multipart(&qualified).await;
        record(StorageOperation::CreateMultipart, start, &result);

        let upload = result.context(ObjectStoreSnafu)?;
        Ok(ObjectUpload {
            writer: WriteMultipart::new(upload),
            path: qualified,
            bytes: 0,
        })
    }
}

/// An in-progress streamed upload. Bytes become visible only on `finish`.
pub struct ObjectUpload {
    writer: WriteMultipart,
    path: Path,
    bytes: u64,
}

impl ObjectUpload {
    /// Append bytes to the upload, waiting if too many parts are in flight.
    pub async fn put(&mut self, data: Bytes) -> Result<(), StorageError> {
        self.writer
            .wait_for_capacity(MAX_IN_FLIGHT_PARTS)
            .await
            .context(ObjectStoreSnafu)?;
        self.bytes += data.len() as u64;
        self.writer.put(data);
        Ok(())
    }

    /// Bytes pushed so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Flush remaining parts and complete the upload.
    pub async fn finish(self) -> Result<(), StorageError> {
        let start = Instant::now();
        let result = self.writer.finish().await;
        record(StorageOperation::CompleteMultipart, start, &result);

        result.context(ObjectStoreSnafu)?;
        debug!("Completed upload of {} bytes to {}", self.bytes, self.path);
        Ok(())
    }

    /// Abort the upload; the destination is left untouched.
    pub async fn abort(self) -> Result<(), StorageError> {
        self.writer.abort().await.context(ObjectStoreSnafu)
    }
}
