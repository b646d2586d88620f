//! Chunk serialization.

use bytes::Bytes;
use csv::{StringRecord, Terminator, Writer, WriterBuilder};
use snafu::prelude::*;

use crate::error::{EncodeError, EncodeFlushSnafu, EncodeRecordSnafu};
use crate::source::RowChunk;

/// Serialize a chunk to CSV text.
///
/// When `emit_header` is set the chunk's header row is written first. When
/// `tag_column` is set, every row gets one more field holding the chunk's
/// source reference, and the header gets `tag_column` as its last name.
pub fn encode_chunk(
    chunk: &RowChunk,
    emit_header: bool,
    tag_column: Option<&str>,
) -> Result<Bytes, EncodeError> {
    let source_ref = chunk.source_ref.as_str();
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    if emit_header {
        write_row(&mut writer, &chunk.header, tag_column, source_ref)?;
    }

    let tag_value = tag_column.map(|_| source_ref);
    for row in &chunk.rows {
        write_row(&mut writer, row, tag_value, source_ref)?;
    }

    let buf = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context(EncodeFlushSnafu { source_ref })?;
    Ok(Bytes::from(buf))
}

fn write_row(
    writer: &mut Writer<Vec<u8>>,
    record: &StringRecord,
    extra: Option<&str>,
    source_ref: &str,
) -> Result<(), EncodeError> {
    writer
        .write_record(record.iter().chain(extra))
        .context(EncodeRecordSnafu { source_ref })
}
