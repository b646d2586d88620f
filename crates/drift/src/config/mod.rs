//! Configuration for the drift merge tool.
//!
//! A run is configured by one or more YAML files. Environment variables are
//! interpolated before parsing, and later files replace whole top-level
//! sections (`source`, `sink`, `merge`) of earlier ones.

mod cli;

pub use cli::CliArgs;

use serde::Deserialize;
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;

use drift_core::config::{Mergeable, interpolate, load_from_paths};
use drift_core::error::YamlParseSnafu;

use crate::error::ConfigError;
use crate::merge::{DEFAULT_SOURCE_COLUMN, MergeOptions, MergeStrategy};
use crate::source::DEFAULT_CHUNK_SIZE;

/// Configuration for the input location.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Storage URL of the source root (S3, GCS, Azure, local).
    pub path: String,
    /// Optional string prefix narrowing which objects are listed.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Storage options for source storage (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

/// Configuration for the destination object.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    /// Storage URL of the destination root.
    pub path: String,
    /// Name of the merged object, relative to `path`.
    #[serde(default = "default_object_name")]
    pub object_name: String,
    /// Storage options for destination storage.
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

fn default_object_name() -> String {
    "merged_output.csv".to_string()
}

/// Merge behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    #[serde(default)]
    pub strategy: MergeStrategy,
    /// Rows per chunk in append-rewrite mode.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Append a column naming each row's source file.
    #[serde(default)]
    pub include_source_filename: bool,
    /// Name of the appended column.
    #[serde(default = "default_source_column")]
    pub source_column: String,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_source_column() -> String {
    DEFAULT_SOURCE_COLUMN.to_string()
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::default(),
            chunk_size: default_chunk_size(),
            include_source_filename: false,
            source_column: default_source_column(),
        }
    }
}

impl MergeConfig {
    /// Tag column name, if tagging is enabled.
    pub fn tag_column(&self) -> Option<&str> {
        self.include_source_filename
            .then_some(self.source_column.as_str())
    }
}

/// One config file. Sections missing from the file are left unset.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub sink: Option<SinkConfig>,
    #[serde(default)]
    pub merge: Option<MergeConfig>,
}

impl Mergeable for ConfigLayer {
    fn parse_yaml(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).context(YamlParseSnafu)
    }

    fn merge(&mut self, other: Self) {
        if other.source.is_some() {
            self.source = other.source;
        }
        if other.sink.is_some() {
            self.sink = other.sink;
        }
        if other.merge.is_some() {
            self.merge = other.merge;
        }
    }
}

/// Main configuration for drift.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    pub merge: MergeConfig,
}

impl Config {
    /// Load, layer and validate configuration files.
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let layer: ConfigLayer = load_from_paths(paths)?;
        Self::from_layer(layer)
    }

    /// Parse and validate a single YAML document.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let result = interpolate(contents);
        if !result.is_ok() {
            return Err(ConfigError::EnvInterpolation {
                message: result.errors.join("\n"),
            });
        }
        Self::from_layer(ConfigLayer::parse_yaml(&result.text)?)
    }

    fn from_layer(layer: ConfigLayer) -> Result<Self, ConfigError> {
        let source = layer.source.ok_or_else(|| ConfigError::MissingSection {
            section: "source".to_string(),
        })?;
        let sink = layer.sink.ok_or_else(|| ConfigError::MissingSection {
            section: "sink".to_string(),
        })?;

        let config = Config {
            source,
            sink,
            merge: layer.merge.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.path.is_empty() {
            return Err(ConfigError::EmptySourcePath);
        }
        if self.sink.path.is_empty() {
            return Err(ConfigError::EmptySinkPath);
        }
        if self.sink.object_name.is_empty() {
            return Err(ConfigError::EmptyObjectName);
        }
        if self.merge.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.merge.include_source_filename && self.merge.source_column.is_empty() {
            return Err(ConfigError::EmptySourceColumn);
        }
        Ok(())
    }

    /// Engine options for this configuration.
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            strategy: self.merge.strategy,
            chunk_size: self.merge.chunk_size,
            tag_column: self.merge.tag_column().map(str::to_string),
            target: self.sink.object_name.clone(),
        }
    }
}
