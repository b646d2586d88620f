//! Internal events for drift metrics emission.
//!
//! Each event struct represents a measurable occurrence during a merge run.
//! Events implement the `InternalEvent` trait which records the corresponding
//! metric. Merge events carry a `target` label holding the destination object
//! name so that several merge jobs reporting to one recorder stay apart.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

// ============================================================================
// Merge progress events
// ============================================================================

/// Event emitted after listing the source location.
pub struct FilesDiscovered {
    pub count: u64,
    pub target: String,
}

impl InternalEvent for FilesDiscovered {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Files discovered");
        counter!("drift_files_discovered_total", "target" => self.target).increment(self.count);
    }
}

/// Event emitted once a source file has been fully written or staged.
pub struct FileMerged {
    pub target: String,
}

impl InternalEvent for FileMerged {
    fn emit(self) {
        trace!(target = %self.target, "File merged");
        counter!("drift_files_merged_total", "target" => self.target).increment(1);
    }
}

/// Event emitted when data rows reach the destination.
pub struct RowsMerged {
    pub count: u64,
    pub target: String,
}

impl InternalEvent for RowsMerged {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Rows merged");
        counter!("drift_rows_merged_total", "target" => self.target).increment(self.count);
    }
}

/// Event emitted when an encoded chunk is handed to the destination.
pub struct ChunkWritten {
    pub bytes: u64,
    pub target: String,
}

impl InternalEvent for ChunkWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, target = %self.target, "Chunk written");
        counter!("drift_chunks_written_total", "target" => self.target.clone()).increment(1);
        counter!("drift_chunk_bytes_total", "target" => self.target).increment(self.bytes);
    }
}

/// Event emitted for every whole-object rewrite in append-rewrite mode.
///
/// `bytes` is the full size of the rewritten object, so the counter grows
/// quadratically with the merged output.
pub struct DestinationRewritten {
    pub bytes: u64,
    pub target: String,
}

impl InternalEvent for DestinationRewritten {
    fn emit(self) {
        trace!(bytes = self.bytes, target = %self.target, "Destination rewritten");
        counter!("drift_rewrite_bytes_total", "target" => self.target).increment(self.bytes);
    }
}

/// Event emitted when a block is staged.
pub struct BlockStaged {
    pub bytes: u64,
    pub target: String,
}

impl InternalEvent for BlockStaged {
    fn emit(self) {
        trace!(bytes = self.bytes, target = %self.target, "Block staged");
        counter!("drift_blocks_staged_total", "target" => self.target.clone()).increment(1);
        counter!("drift_staged_bytes_total", "target" => self.target).increment(self.bytes);
    }
}

/// Event emitted when a block list is committed.
pub struct BlocksCommitted {
    pub count: u64,
    pub duration: Duration,
    pub target: String,
}

impl InternalEvent for BlocksCommitted {
    fn emit(self) {
        trace!(
            count = self.count,
            duration_ms = self.duration.as_millis(),
            target = %self.target,
            "Blocks committed"
        );
        counter!("drift_blocks_committed_total", "target" => self.target.clone())
            .increment(self.count);
        histogram!("drift_commit_duration_seconds", "target" => self.target)
            .record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
    Delete,
    List,
    CreateMultipart,
    PutPart,
    CompleteMultipart,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::Delete => "delete",
            StorageOperation::List => "list",
            StorageOperation::CreateMultipart => "create_multipart",
            StorageOperation::PutPart => "put_part",
            StorageOperation::CompleteMultipart => "complete_multipart",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    /// Status matching the outcome of a request.
    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "drift_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a storage request completes with duration.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request duration"
        );
        histogram!(
            "drift_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
