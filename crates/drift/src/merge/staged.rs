//! Stage-and-commit strategy.
//!
//! Each source is read whole, encoded and staged as one immutable block under
//! a freshly minted id. Sources without data rows stage nothing. Once every
//! source is staged, the destination is materialized by committing the ids
//! in processing order.

use std::time::Instant;

use snafu::prelude::*;
use tracing::info;

use drift_core::emit;
use drift_core::metrics::events::{BlockStaged, BlocksCommitted, FileMerged, RowsMerged};

use crate::error::{CommitSnafu, MergeError, StageSnafu};
use crate::sink::BlockSink;
use crate::source::SourceStore;
use crate::staging::{BlockDescriptor, BlockSequence};

use super::{MergeEngine, MergeSummary};

impl MergeEngine {
    /// Merge `sources` by staging one block per source and committing once.
    pub async fn stage_and_commit<S, D>(
        mut self,
        store: &S,
        sources: &[String],
        sink: &mut D,
    ) -> Result<MergeSummary, MergeError>
    where
        S: SourceStore + ?Sized,
        D: BlockSink + ?Sized,
    {
        if !self.log_start(sources) {
            return Ok(self.summary);
        }
        let target = self.options.target.clone();
        let mut sequence = BlockSequence::default();
        let mut block_ids = Vec::with_capacity(sources.len());

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
            let chunk = self.reader.read_whole(source_ref, data)?;
            self.summary.files_processed += 1;

            if chunk.is_empty() {
                info!(
                    target = %target,
                    source = %source_ref,
                    "No data rows in {}, nothing staged",
                    source_ref
                );
                emit!(FileMerged {
                    target: target.clone(),
                });
                continue;
            }

            let rows = chunk.len() as u64;
            let payload = self.encode(&chunk)?;
            let bytes = payload.len() as u64;
            let id = sequence.mint();

            sink.stage_block(BlockDescriptor {
                id,
                payload,
                source_ref: source_ref.clone(),
            })
            .await
            .context(StageSnafu {
                block_id: id.to_string(),
                source_ref: source_ref.as_str(),
            })?;
            block_ids.push(id);

            self.summary.total_rows += rows;
            self.summary.bytes_written += bytes;
            emit!(BlockStaged {
                bytes,
                target: target.clone(),
            });
            emit!(RowsMerged {
                count: rows,
                target: target.clone(),
            });
            emit!(FileMerged {
                target: target.clone(),
            });
            info!(
                target = %target,
                source = %source_ref,
                "Staged block {} with {} rows from {} (total: {})",
                id,
                rows,
                source_ref,
                self.summary.total_rows
            );
        }

        let start = Instant::now();
        sink.commit(&block_ids).await.context(CommitSnafu {
            target: target.as_str(),
            block_count: block_ids.len(),
        })?;
        self.summary.blocks_committed = block_ids.len();

        emit!(BlocksCommitted {
            count: block_ids.len() as u64,
            duration: start.elapsed(),
            target: target.clone(),
        });
        info!(
            target = %target,
            "Committed {} block(s) to {}",
            block_ids.len(),
            target
        );

        Ok(self.summary)
    }
}
