//! Chunked CSV reader.
//!
//! Decodes comma-delimited UTF-8 text with a header row into `RowChunk`s of
//! at most `chunk_size` records. Decoding is lazy: each call to `next` on
//! the chunk iterator parses only the rows it returns.
//!
//! Reading is strict. A source without a header row, a record whose field
//! count differs from the header, or any invalid UTF-8, fails the source. A
//! header-only source is valid and has no rows.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use csv::{Reader, ReaderBuilder, StringRecord};
use snafu::prelude::*;

use crate::error::{HeaderSnafu, MissingHeaderSnafu, ReaderError, RecordSnafu};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Default number of rows per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// A bounded batch of rows read from one source.
#[derive(Debug, Clone)]
pub struct RowChunk {
    /// Source the rows were read from.
    pub source_ref: String,
    /// Position of this chunk within its source, starting at 0.
    pub index: usize,
    /// Header row of the source.
    pub header: Arc<StringRecord>,
    /// Data rows, in source order.
    pub rows: Vec<StringRecord>,
}

impl RowChunk {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Splits CSV bytes into row chunks.
#[derive(Debug, Clone, Copy)]
pub struct CsvChunkReader {
    chunk_size: usize,
}

impl Default for CsvChunkReader {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl CsvChunkReader {
    /// Create a reader yielding chunks of at most `chunk_size` rows.
    ///
    /// A `chunk_size` of 0 is treated as 1.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Lazily decode `data` into chunks. A source without data rows yields
    /// nothing.
    pub fn chunks(&self, source_ref: &str, data: Bytes) -> CsvChunks {
        CsvChunks::new(source_ref, data, self.chunk_size)
    }

    /// Decode every row of `data` into a single chunk.
    ///
    /// Unlike `chunks`, a source without data rows still returns a chunk
    /// carrying its header and no rows.
    pub fn read_whole(&self, source_ref: &str, data: Bytes) -> Result<RowChunk, ReaderError> {
        let mut chunks = CsvChunks::new(source_ref, data, usize::MAX);
        match chunks.next() {
            Some(chunk) => chunk,
            None => chunks.empty_chunk(),
        }
    }
}

/// Iterator over the chunks of one source.
pub struct CsvChunks {
    reader: Reader<Cursor<Bytes>>,
    source_ref: String,
    chunk_size: usize,
    header: Option<Arc<StringRecord>>,
    next_index: usize,
    finished: bool,
}

impl CsvChunks {
    fn new(source_ref: &str, data: Bytes, chunk_size: usize) -> Self {
        let data = if data.starts_with(UTF8_BOM) {
            data.slice(UTF8_BOM.len()..)
        } else {
            data
        };
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(Cursor::new(data));

        Self {
            reader,
            source_ref: source_ref.to_string(),
            chunk_size,
            header: None,
            next_index: 0,
            finished: false,
        }
    }

    fn header(&mut self) -> Result<Arc<StringRecord>, ReaderError> {
        if let Some(header) = &self.header {
            return Ok(Arc::clone(header));
        }
        let header = Arc::new(
            self.reader
                .headers()
                .context(HeaderSnafu {
                    source_ref: &self.source_ref,
                })?
                .clone(),
        );
        ensure!(
            !header.is_empty(),
            MissingHeaderSnafu {
                source_ref: &self.source_ref,
            }
        );
        self.header = Some(Arc::clone(&header));
        Ok(header)
    }

    fn empty_chunk(&mut self) -> Result<RowChunk, ReaderError> {
        Ok(RowChunk {
            source_ref: self.source_ref.clone(),
            index: 0,
            header: self.header()?,
            rows: Vec::new(),
        })
    }

    fn next_chunk(&mut self) -> Result<Option<RowChunk>, ReaderError> {
        let header = self.header()?;
        let mut rows = Vec::with_capacity(self.chunk_size.min(1024));

        while rows.len() < self.chunk_size {
            let mut record = StringRecord::new();
            let more = self.reader.read_record(&mut record).context(RecordSnafu {
                source_ref: &self.source_ref,
            })?;
            if !more {
                self.finished = true;
                break;
            }
            rows.push(record);
        }

        if rows.is_empty() {
            return Ok(None);
        }

        let chunk = RowChunk {
            source_ref: self.source_ref.clone(),
            index: self.next_index,
            header,
            rows,
        };
        self.next_index += 1;
        Ok(Some(chunk))
    }
}

impl Iterator for CsvChunks {
    type Item = Result<RowChunk, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_chunk() {
            Ok(chunk) => chunk.map(Ok),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
