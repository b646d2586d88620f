//! Error types for the drift merge tool.

use snafu::prelude::*;

// Re-export common errors
pub use drift_core::error::{ConfigError, StorageError};

/// Errors that can occur while decoding CSV source data.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReaderError {
    /// The header row could not be decoded.
    #[snafu(display("Failed to read CSV header in {source_ref}: {source}"))]
    Header {
        source_ref: String,
        source: csv::Error,
    },

    /// The source has no header row at all (zero bytes or only blank lines).
    #[snafu(display("No CSV header in {source_ref}: source is empty"))]
    MissingHeader { source_ref: String },

    /// A data row could not be decoded (invalid UTF-8, wrong field count).
    #[snafu(display("Malformed CSV record in {source_ref}: {source}"))]
    Record {
        source_ref: String,
        source: csv::Error,
    },
}

/// Errors that can occur while serializing a chunk back to CSV.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EncodeError {
    /// Failed to write a record.
    #[snafu(display("Failed to encode CSV record for {source_ref}: {source}"))]
    EncodeRecord {
        source_ref: String,
        source: csv::Error,
    },

    /// Failed to flush the encoded buffer.
    #[snafu(display("Failed to flush CSV encoder for {source_ref}: {source}"))]
    EncodeFlush {
        source_ref: String,
        source: std::io::Error,
    },
}

/// Errors raised by destination sinks.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// The underlying storage call failed.
    #[snafu(display("{source}"))]
    SinkStorage { source: StorageError },

    /// A block id was committed that was never staged through this sink.
    #[snafu(display("Block {block_id} was never staged"))]
    UnknownBlock { block_id: String },

    /// The commit list does not follow the order blocks were staged in.
    #[snafu(display("Block {block_id} is out of staging order in the commit list"))]
    BlockOrder { block_id: String },
}

/// Errors that abort a merge run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MergeError {
    /// A source object could not be fetched.
    #[snafu(display("Failed to read source {source_ref}: {source}"))]
    SourceRead {
        source_ref: String,
        source: StorageError,
    },

    /// A source object could not be decoded as CSV.
    #[snafu(display("{source}"))]
    Decode { source: ReaderError },

    /// A chunk could not be serialized.
    #[snafu(display("{source}"))]
    Encode { source: EncodeError },

    /// Writing or reading back the destination failed.
    #[snafu(display("Failed to write destination {target}: {source}"))]
    Write { target: String, source: SinkError },

    /// Staging a block failed.
    #[snafu(display("Failed to stage block {block_id} for {source_ref}: {source}"))]
    Stage {
        block_id: String,
        source_ref: String,
        source: SinkError,
    },

    /// Committing the block list failed.
    #[snafu(display("Failed to commit {block_count} blocks to {target}: {source}"))]
    Commit {
        target: String,
        block_count: usize,
        source: SinkError,
    },
}

/// Top-level pipeline errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Storage error.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// The destination could not be reached before any source was read.
    #[snafu(display("Destination {url} is not reachable: {source}"))]
    DestinationUnreachable { url: String, source: StorageError },

    /// Merge error.
    #[snafu(display("Merge failed: {source}"))]
    Merge { source: MergeError },
}

impl From<StorageError> for SinkError {
    fn from(source: StorageError) -> Self {
        SinkError::SinkStorage { source }
    }
}

impl From<StorageError> for PipelineError {
    fn from(source: StorageError) -> Self {
        PipelineError::Storage { source }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<MergeError> for PipelineError {
    fn from(source: MergeError) -> Self {
        PipelineError::Merge { source }
    }
}

impl From<ReaderError> for MergeError {
    fn from(source: ReaderError) -> Self {
        MergeError::Decode { source }
    }
}

impl From<EncodeError> for MergeError {
    fn from(source: EncodeError) -> Self {
        MergeError::Encode { source }
    }
}
