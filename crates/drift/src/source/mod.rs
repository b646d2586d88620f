//! Source side of a merge: discovery, fetching and CSV decoding.

mod listing;
mod reader;
mod traits;

pub use listing::{CSV_EXTENSION, list_csv_files};
pub use reader::{CsvChunkReader, CsvChunks, DEFAULT_CHUNK_SIZE, RowChunk};
pub use traits::SourceStore;
