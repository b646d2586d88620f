//! Traits for destination sinks.
//!
//! The append-rewrite strategy needs a sink that can replace the destination
//! object wholesale and read it back. The stage-and-commit strategy needs a
//! sink that accepts immutable blocks and later materializes the object from
//! an ordered block list. Taking `&mut self` keeps every sink single-writer.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SinkError;
use crate::staging::{BlockDescriptor, BlockId};

/// A destination that is rewritten in full on every write.
#[async_trait]
pub trait RewriteSink: Send {
    /// Create or overwrite the destination object with `data`.
    async fn write_new(&mut self, data: Bytes) -> Result<(), SinkError>;

    /// Read back the destination object's current contents.
    async fn read_all(&self) -> Result<Bytes, SinkError>;
}

/// A destination assembled from staged blocks.
#[async_trait]
pub trait BlockSink: Send {
    /// Persist one block. Staged blocks stay invisible until `commit`.
    async fn stage_block(&mut self, block: BlockDescriptor) -> Result<(), SinkError>;

    /// Materialize the destination as the concatenation of `block_ids`, in
    /// the order given. An empty list produces an empty object.
    ///
    /// Sinks backed by a native block API may require `block_ids` to name
    /// exactly the staged blocks, in staging order, and fail with
    /// `SinkError::BlockOrder` or `SinkError::UnknownBlock` otherwise.
    async fn commit(&mut self, block_ids: &[BlockId]) -> Result<(), SinkError>;
}
