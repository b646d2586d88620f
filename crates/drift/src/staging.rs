//! Block identifiers for the stage-and-commit strategy.
//!
//! A merge run mints one `BlockId` per non-empty source, in processing order.
//! The id wraps a sequence number; its wire form is the base64 encoding of
//! the zero-padded 10-digit counter (`MDAwMDAwMDAwMA==` for block 0), which
//! keeps every id the same length as block-blob stores require.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use std::fmt;

/// Identifier of one staged block. Ordering follows the sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u64);

impl BlockId {
    pub fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    /// Zero-padded decimal form, used for emulated staging object names.
    pub fn padded(&self) -> String {
        format!("{:010}", self.0)
    }

    /// Base64 wire form.
    pub fn encoded(&self) -> String {
        STANDARD.encode(self.padded())
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded())
    }
}

/// Mints strictly increasing block ids for a single run.
#[derive(Debug, Default)]
pub struct BlockSequence {
    next: u64,
}

impl BlockSequence {
    pub fn mint(&mut self) -> BlockId {
        let id = BlockId(self.next);
        self.next += 1;
        id
    }
}

/// One immutable staged payload.
#[derive(Debug, Clone)]
pub struct BlockDescriptor {
    pub id: BlockId,
    pub payload: Bytes,
    /// Source the payload was built from, for logging.
    pub source_ref: String,
}
