//! Configuration helpers shared by drift binaries.

mod loader;
mod vars;

pub use loader::{Mergeable, is_yaml_file, load_from_paths, read_interpolated};
pub use vars::{InterpolationResult, interpolate};
