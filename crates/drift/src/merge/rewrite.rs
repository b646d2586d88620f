//! Append-rewrite strategy.
//!
//! The destination is treated as append-incapable: the first chunk of the run
//! creates it (header included) and every later chunk is appended by reading
//! the whole object back and writing it again with the chunk's rows added.

use bytes::{Bytes, BytesMut};
use snafu::prelude::*;
use tracing::info;

use drift_core::emit;
use drift_core::metrics::events::{ChunkWritten, DestinationRewritten, FileMerged, RowsMerged};

use crate::error::{MergeError, WriteSnafu};
use crate::sink::RewriteSink;
use crate::source::SourceStore;

use super::{MergeEngine, MergeSummary};

impl MergeEngine {
    /// Merge `sources` by rewriting the destination once per chunk.
    pub async fn append_rewrite<S, D>(
        mut self,
        store: &S,
        sources: &[String],
        sink: &mut D,
    ) -> Result<MergeSummary, MergeError>
    where
        S: SourceStore + ?Sized,
        D: RewriteSink + ?Sized,
    {
        if !self.log_start(sources) {
            return Ok(self.summary);
        }
        let target = self.options.target.clone();

        for (position, source_ref) in sources.iter().enumerate() {
            info!(
                target = %target,
                source = %source_ref,
                "Processing file {}/{}: {}",
                position + 1,
                sources.len(),
                source_ref
            );

            let data = self.fetch(store, source_ref).await?;
            let mut file_rows = 0u64;

            for chunk in self.reader.chunks(source_ref, data) {
                let chunk = chunk?;
                let rows = chunk.len() as u64;
                let first_write = !self.header_emitted;
                let encoded = self.encode(&chunk)?;
                let chunk_bytes = encoded.len() as u64;

                let payload = if first_write {
                    encoded
                } else {
                    let existing = sink.read_all().await.context(WriteSnafu {
                        target: target.as_str(),
                    })?;
                    concat(&existing, &encoded)
                };
                let payload_bytes = payload.len() as u64;

                sink.write_new(payload).await.context(WriteSnafu {
                    target: target.as_str(),
                })?;

                file_rows += rows;
                self.summary.total_rows += rows;
                self.summary.rewrites += 1;
                self.summary.bytes_written += payload_bytes;

                emit!(ChunkWritten {
                    bytes: chunk_bytes,
                    target: target.clone(),
                });
                emit!(RowsMerged {
                    count: rows,
                    target: target.clone(),
                });
                if !first_write {
                    info!(
                        target = %target,
                        "Rewrote {} with {} bytes to append {} bytes",
                        target,
                        payload_bytes,
                        chunk_bytes
                    );
                    emit!(DestinationRewritten {
                        bytes: payload_bytes,
                        target: target.clone(),
                    });
                }
                info!(
                    target = %target,
                    source = %source_ref,
                    "Chunk {} from {}: {} rows (total: {})",
                    chunk.index + 1,
                    source_ref,
                    rows,
                    self.summary.total_rows
                );
            }

            self.summary.files_processed += 1;
            emit!(FileMerged {
                target: target.clone(),
            });
            info!(
                target = %target,
                source = %source_ref,
                "Merged {} rows from {}",
                file_rows,
                source_ref
            );
        }

        Ok(self.summary)
    }
}

fn concat(existing: &[u8], appended: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(existing.len() + appended.len());
    buf.extend_from_slice(existing);
    buf.extend_from_slice(appended);
    buf.freeze()
}
