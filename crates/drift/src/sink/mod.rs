//! Destination sinks for merged output.

mod object;
mod traits;

pub use object::{ObjectSink, STAGING_DIR, staging_path};
pub use traits::{BlockSink, RewriteSink};
