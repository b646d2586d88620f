//! drift-core: shared components for the drift CSV merge tool.
//!
//! - `storage/` - Multi-cloud storage abstraction (S3, GCS, Azure, local, in-memory)
//! - `metrics/` - Metric events behind the `emit!` macro
//! - `config/` - Multi-file YAML loading and environment variable interpolation
//! - `tracing` - Subscriber setup for the binary
//! - `error` - Storage and configuration errors

pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod tracing;

// Re-export commonly used items
pub use config::{Mergeable, interpolate, load_from_paths};
pub use error::{ConfigError, StorageError};
pub use storage::{BackendConfig, ObjectUpload, StorageProvider, StorageProviderRef};
pub use tracing::init_tracing;
