//! Object-store backed destination.
//!
//! `ObjectSink` writes one named object through a `StorageProvider` and
//! implements both sink traits.
//!
//! Block staging takes one of two paths, fixed when the sink is built:
//!
//! - **Native**: the backend stages blocks itself (Azure block blobs,
//!   in-memory). Each block becomes one part of a single block upload, and
//!   commit completes that upload.
//! - **Emulated**: every other backend. Blocks are written as separate
//!   objects under `_drift_staging/{object}/`, and commit streams them in list
//!   order into a multipart upload of the destination, then deletes them.
//!
//! Either way nothing is visible at the destination until commit succeeds,
//! and blocks staged by a failed run are left behind.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;
use object_store::MultipartId;
use object_store::multipart::PartId;
use object_store::path::Path;
use tracing::{debug, warn};

use drift_core::storage::{ObjectUpload, StorageProviderRef};

use crate::error::SinkError;
use crate::staging::{BlockDescriptor, BlockId};

use super::traits::{BlockSink, RewriteSink};

/// Directory, relative to the destination root, holding emulated blocks.
pub const STAGING_DIR: &str = "_drift_staging";

enum Staging {
    Native {
        upload_id: Option<MultipartId>,
        /// Staged parts, in staging order.
        parts: Vec<(BlockId, PartId)>,
    },
    Emulated {
        staged: HashSet<BlockId>,
    },
}

/// A sink writing a single object through a storage provider.
pub struct ObjectSink {
    storage: StorageProviderRef,
    object: Path,
    staging: Staging,
}

impl ObjectSink {
    /// Create a sink for `object_name`, relative to the storage root.
    pub fn new(storage: StorageProviderRef, object_name: &str) -> Self {
        let staging = if storage.supports_native_blocks() {
            Staging::Native {
                upload_id: None,
                parts: Vec::new(),
            }
        } else {
            Staging::Emulated {
                staged: HashSet::new(),
            }
        };

        Self {
            storage,
            object: Path::from(object_name),
            staging,
        }
    }

    /// Whether blocks are staged through the backend's native block API.
    pub fn uses_native_blocks(&self) -> bool {
        matches!(self.staging, Staging::Native { .. })
    }
}

/// Object name of an emulated block.
pub fn staging_path(object: &Path, id: BlockId) -> Path {
    Path::from(format!("{STAGING_DIR}/{object}/{}.block", id.padded()))
}

#[async_trait]
impl RewriteSink for ObjectSink {
    async fn write_new(&mut self, data: Bytes) -> Result<(), SinkError> {
        self.storage.put(&self.object, data).await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<Bytes, SinkError> {
        Ok(self.storage.get(self.object.clone()).await?)
    }
}

#[async_trait]
impl BlockSink for ObjectSink {
    async fn stage_block(&mut self, block: BlockDescriptor) -> Result<(), SinkError> {
        let size = block.payload.len();

        match &mut self.staging {
            Staging::Native { upload_id, parts } => {
                let id = match upload_id.clone() {
                    Some(id) => id,
                    None => {
                        let id = self.storage.create_block_upload(&self.object).await?;
                        *upload_id = Some(id.clone());
                        id
                    }
                };
                let part = self
                    .storage
                    .put_block(&self.object, &id, parts.len(), block.payload)
                    .await?;
                parts.push((block.id, part));
            }
            Staging::Emulated { staged } => {
                let path = staging_path(&self.object, block.id);
                self.storage.put(&path, block.payload).await?;
                staged.insert(block.id);
            }
        }

        debug!(
            "Staged block {} ({} bytes) from {} for {}",
            block.id, size, block.source_ref, self.object
        );
        Ok(())
    }

    async fn commit(&mut self, block_ids: &[BlockId]) -> Result<(), SinkError> {
        match &mut self.staging {
            Staging::Native { upload_id, parts } => {
                // Native parts concatenate in staging order, so the list must
                // name exactly the staged blocks in that order.
                let staged: HashMap<BlockId, usize> = parts
                    .iter()
                    .enumerate()
                    .map(|(position, (id, _))| (*id, position))
                    .collect();
                for (position, id) in block_ids.iter().enumerate() {
                    match staged.get(id) {
                        None => {
                            return Err(SinkError::UnknownBlock {
                                block_id: id.to_string(),
                            });
                        }
                        Some(staged_at) if *staged_at != position => {
                            return Err(SinkError::BlockOrder {
                                block_id: id.to_string(),
                            });
                        }
                        Some(_) => {}
                    }
                }
                if block_ids.len() != parts.len() {
                    return Err(SinkError::BlockOrder {
                        block_id: parts[block_ids.len()].0.to_string(),
                    });
                }

                let id = match upload_id.take() {
                    Some(id) => id,
                    None => self.storage.create_block_upload(&self.object).await?,
                };
                let part_ids = std::mem::take(parts)
                    .into_iter()
                    .map(|(_, part)| part)
                    .collect();
                self.storage
                    .complete_blocks(&self.object, &id, part_ids)
                    .await?;
            }
            Staging::Emulated { staged } => {
                if let Some(unknown) = block_ids.iter().find(|id| !staged.contains(*id)) {
                    return Err(SinkError::UnknownBlock {
                        block_id: unknown.to_string(),
                    });
                }

                let mut upload = self.storage.start_upload(&self.object).await?;
                let streamed =
                    stream_blocks(&self.storage, &self.object, &mut upload, block_ids).await;
                if let Err(e) = streamed {
                    if let Err(abort_err) = upload.abort().await {
                        warn!("Failed to abort upload of {}: {abort_err}", self.object);
                    }
                    return Err(e);
                }
                let bytes = upload.bytes_written();
                upload.finish().await?;
                debug!(
                    "Streamed {} staged blocks ({} bytes) into {}",
                    block_ids.len(),
                    bytes,
                    self.object
                );

                for id in block_ids {
                    self.storage
                        .delete(&staging_path(&self.object, *id))
                        .await?;
                    staged.remove(id);
                }
            }
        }

        debug!("Committed {} blocks to {}", block_ids.len(), self.object);
        Ok(())
    }
}

async fn stream_blocks(
    storage: &StorageProviderRef,
    object: &Path,
    upload: &mut ObjectUpload,
    block_ids: &[BlockId],
) -> Result<(), SinkError> {
    for id in block_ids {
        let data = storage.get(staging_path(object, *id)).await?;
        upload.put(data).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::StorageProvider;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn block(sequence: u64, payload: &'static [u8]) -> BlockDescriptor {
        BlockDescriptor {
            id: BlockId::new(sequence),
            payload: Bytes::from_static(payload),
            source_ref: format!("{sequence}.csv"),
        }
    }

    async fn local_sink(temp_dir: &TempDir) -> ObjectSink {
        let storage =
            StorageProvider::for_url_with_options(temp_dir.path().to_str().unwrap(), HashMap::new())
                .await
                .unwrap();
        ObjectSink::new(Arc::new(storage), "out/merged.csv")
    }

    #[tokio::test]
    async fn test_rewrite_roundtrip() {
        let storage = Arc::new(StorageProvider::in_memory());
        let mut sink = ObjectSink::new(Arc::clone(&storage), "merged.csv");

        sink.write_new(Bytes::from_static(b"id\n1\n")).await.unwrap();
        assert_eq!(sink.read_all().await.unwrap().as_ref(), b"id\n1\n");

        sink.write_new(Bytes::from_static(b"id\n2\n")).await.unwrap();
        assert_eq!(sink.read_all().await.unwrap().as_ref(), b"id\n2\n");
    }

    #[tokio::test]
    async fn test_native_commit_concatenates_blocks() {
        let storage = Arc::new(StorageProvider::in_memory());
        let mut sink = ObjectSink::new(Arc::clone(&storage), "merged.csv");
        assert!(sink.uses_native_blocks());

        sink.stage_block(block(0, b"id\n1\n")).await.unwrap();
        sink.stage_block(block(1, b"2\n")).await.unwrap();
        assert!(storage.get("merged.csv").await.unwrap_err().is_not_found());

        sink.commit(&[BlockId::new(0), BlockId::new(1)]).await.unwrap();
        assert_eq!(storage.get("merged.csv").await.unwrap().as_ref(), b"id\n1\n2\n");
    }

    #[tokio::test]
    async fn test_native_commit_rejects_reordered_list() {
        let storage = Arc::new(StorageProvider::in_memory());
        let mut sink = ObjectSink::new(storage, "merged.csv");
        sink.stage_block(block(0, b"a\n")).await.unwrap();
        sink.stage_block(block(1, b"b\n")).await.unwrap();

        let err = sink
            .commit(&[BlockId::new(1), BlockId::new(0)])
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::BlockOrder { .. }));
    }

    #[tokio::test]
    async fn test_native_empty_commit_creates_empty_object() {
        let storage = Arc::new(StorageProvider::in_memory());
        let mut sink = ObjectSink::new(Arc::clone(&storage), "merged.csv");

        sink.commit(&[]).await.unwrap();
        assert!(storage.get("merged.csv").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_emulated_commit_streams_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let mut sink = local_sink(&temp_dir).await;
        assert!(!sink.uses_native_blocks());

        sink.stage_block(block(0, b"id,name\n1,a\n")).await.unwrap();
        sink.stage_block(block(1, b"2,b\n")).await.unwrap();
        let staged = temp_dir
            .path()
            .join("_drift_staging/out/merged.csv/0000000001.block");
        assert!(staged.exists());
        assert!(!temp_dir.path().join("out/merged.csv").exists());

        sink.commit(&[BlockId::new(0), BlockId::new(1)]).await.unwrap();

        let merged = std::fs::read(temp_dir.path().join("out/merged.csv")).unwrap();
        assert_eq!(merged, b"id,name\n1,a\n2,b\n");
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn test_emulated_commit_rejects_unknown_block() {
        let temp_dir = TempDir::new().unwrap();
        let mut sink = local_sink(&temp_dir).await;
        sink.stage_block(block(0, b"id\n1\n")).await.unwrap();

        let err = sink
            .commit(&[BlockId::new(0), BlockId::new(7)])
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::UnknownBlock { .. }));
        assert!(!temp_dir.path().join("out/merged.csv").exists());
    }

    #[test]
    fn test_staging_path_layout() {
        let path = staging_path(&Path::from("reports/merged.csv"), BlockId::new(3));
        assert_eq!(
            path.as_ref(),
            "_drift_staging/reports/merged.csv/0000000003.block"
        );
    }
}
