//! Multi-file configuration loading.

use std::path::{Path, PathBuf};

use snafu::prelude::*;

use crate::config::interpolate;
use crate::error::{ConfigError, ReadFileSnafu, UnsupportedFormatSnafu};

/// A config document that can be layered over another one.
pub trait Mergeable: Sized + Default {
    /// Parse one interpolated YAML document.
    fn parse_yaml(contents: &str) -> Result<Self, ConfigError>;

    /// Overlay `other` on top of `self`; values present in `other` win.
    fn merge(&mut self, other: Self);
}

/// Check if a path has a YAML extension.
pub fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

/// Read a YAML file and interpolate environment variables into it.
pub fn read_interpolated(path: &Path) -> Result<String, ConfigError> {
    ensure!(is_yaml_file(path), UnsupportedFormatSnafu { path });

    let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;

    let result = interpolate(&contents);
    if !result.is_ok() {
        return Err(ConfigError::EnvInterpolation {
            message: result.errors.join("\n"),
        });
    }
    Ok(result.text)
}

/// Load and layer config files in order. Every failing file is reported.
pub fn load_from_paths<C: Mergeable>(paths: &[PathBuf]) -> Result<C, ConfigError> {
    let mut config = C::default();
    let mut errors = Vec::new();

    for path in paths {
        match read_interpolated(path).and_then(|text| C::parse_yaml(&text)) {
            Ok(partial) => config.merge(partial),
            Err(e) => errors.push(format!("{}: {}", path.display(), e)),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::MultipleErrors { errors });
    }
    Ok(config)
}
