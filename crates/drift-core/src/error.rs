//! Common error types shared by the drift crates.
//!
//! Storage and configuration failures are defined here so that both the
//! storage layer and the merge pipeline can surface them unchanged.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Failures raised by `StorageProvider` and the backend builders.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    #[snafu(display("Unrecognized storage URL '{url}'"))]
    InvalidUrl { url: String },

    #[snafu(display("Object store request failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// The local root directory could not be created.
    #[snafu(display("Cannot create local storage root {path}: {source}"))]
    CreateRoot {
        path: String,
        source: std::io::Error,
    },

    /// A backend builder rejected its options or environment.
    #[snafu(display("Invalid {backend} storage configuration: {source}"))]
    BackendConfig {
        backend: &'static str,
        source: object_store::Error,
    },

    /// Block staging requested on a backend without a native block API.
    #[snafu(display("Storage backend {url} does not support native block staging"))]
    BlocksUnsupported { url: String },
}

impl StorageError {
    /// True when the underlying request failed because the object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::ObjectStore {
                source: object_store::Error::NotFound { .. }
            }
        )
    }
}

// ============ Config Errors ============

/// Failures while loading, interpolating or validating config files.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("source.path must not be empty"))]
    EmptySourcePath,

    #[snafu(display("sink.path must not be empty"))]
    EmptySinkPath,

    #[snafu(display("sink.object_name must not be empty"))]
    EmptyObjectName,

    /// Chunk size must be a positive row count.
    #[snafu(display("merge.chunk_size must be greater than zero"))]
    ZeroChunkSize,

    /// Tagging is enabled without a column name.
    #[snafu(display("merge.source_column cannot be empty when include_source_filename is set"))]
    EmptySourceColumn,

    /// A required section is missing after all files were merged.
    #[snafu(display("Missing required config section '{section}'"))]
    MissingSection { section: String },

    /// One or more `${VAR}` references could not be resolved.
    #[snafu(display("Unresolved environment variables in config:\n{message}"))]
    EnvInterpolation { message: String },

    #[snafu(display("Invalid config YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    #[snafu(display("Failed to read configuration file {}: {source}", path.display()))]
    ReadFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// Config files must be YAML.
    #[snafu(display("Config file {} is not a .yaml or .yml file", path.display()))]
    UnsupportedFormat { path: std::path::PathBuf },

    /// Every failing file of a multi-file load, one message each.
    #[snafu(display("{} config file(s) failed to load:\n{}", errors.len(), errors.join("\n")))]
    MultipleErrors { errors: Vec<String> },
}
