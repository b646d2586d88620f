//! drift: merge many CSV files from object storage into a single CSV object.
//!
//! This crate handles:
//! - Listing CSV files under a source location (S3, GCS, Azure, local)
//! - Decoding them in bounded row chunks
//! - Optionally tagging every row with its source file
//! - Writing the concatenation to one destination object, either by
//!   whole-object rewrites or by staging blocks and committing them once

pub mod config;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod staging;

/// Re-export storage module from drift-core for convenience
pub mod storage {
    pub use drift_core::storage::*;
}

// Re-export commonly used items
pub use config::{CliArgs, Config};
pub use error::{MergeError, PipelineError};
pub use merge::{MergeEngine, MergeOptions, MergeStrategy, MergeSummary};
pub use pipeline::{RunOutcome, log_outcome, run_merge};

// Re-export from drift-core
pub use drift_core::{StorageProvider, StorageProviderRef, init_tracing};
