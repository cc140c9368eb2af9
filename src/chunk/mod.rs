//! Chunk Module
//!
//! Chunk records and the in-memory chunk table.
//!
//! ## On-disk Records
//! ```text
//! v1 (28 bytes):  [SplitIndex u32][Virtual u64][Physical u64][Length u64]
//! v2+ (24 bytes): [Virtual u64][Physical u64][Length u64]
//! ```
//! The table is stored at the physical end of the file, right after a
//! repeated magic.

mod table;

use bytes::{BufMut, BytesMut};
use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WdfError};
use crate::header::wire_options;

pub use table::{ChunkTable, Lookup, TableCursor};

/// Record size of the legacy v1 layout
pub const RECORD_SIZE_V1: u64 = 28;

/// Record size of the current layout
pub const RECORD_SIZE: u64 = 24;

/// On-disk size of one chunk record for a generation
pub fn record_size(format_version: u32) -> u64 {
    match format_version {
        1 => RECORD_SIZE_V1,
        _ => RECORD_SIZE,
    }
}

// =============================================================================
// Canonical Record
// =============================================================================

/// A run of real bytes: `length` bytes at virtual `virtual_offset`, stored
/// at `physical_offset` of the underlying stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub virtual_offset: u64,
    pub physical_offset: u64,
    pub length: u64,
}

impl ChunkRecord {
    pub fn new(virtual_offset: u64, physical_offset: u64, length: u64) -> Self {
        Self {
            virtual_offset,
            physical_offset,
            length,
        }
    }

    /// Virtual end (exclusive)
    pub fn end(&self) -> u64 {
        self.virtual_offset + self.length
    }

    /// Physical end (exclusive)
    pub fn physical_end(&self) -> u64 {
        self.physical_offset + self.length
    }

    pub fn contains(&self, virtual_offset: u64) -> bool {
        virtual_offset >= self.virtual_offset && virtual_offset < self.end()
    }

    /// Physical position of a virtual offset inside this chunk
    pub fn physical_at(&self, virtual_offset: u64) -> u64 {
        debug_assert!(self.contains(virtual_offset));
        self.physical_offset + (virtual_offset - self.virtual_offset)
    }
}

// =============================================================================
// Raw Records
// =============================================================================

/// Legacy record body; the split index names the part file holding the data
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct LegacyChunk {
    split_file_index: u32,
    virtual_offset: u64,
    physical_offset: u64,
    length: u64,
}

/// A chunk record in one of its on-disk shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawChunk {
    /// v1 record with the unused split-file index
    Legacy {
        split_file_index: u32,
        record: ChunkRecord,
    },
    /// v2+ record
    Current(ChunkRecord),
}

impl RawChunk {
    /// Wrap a canonical record in the shape used by `format_version`
    pub fn for_version(record: ChunkRecord, format_version: u32) -> Self {
        match format_version {
            1 => RawChunk::Legacy {
                split_file_index: 0,
                record,
            },
            _ => RawChunk::Current(record),
        }
    }

    /// Decode one record of the shape used by `format_version`
    pub fn decode(bytes: &[u8], format_version: u32) -> Result<Self> {
        let opts = wire_options();
        match format_version {
            1 => {
                let raw: LegacyChunk = opts.deserialize(bytes)?;
                Ok(RawChunk::Legacy {
                    split_file_index: raw.split_file_index,
                    record: ChunkRecord::new(raw.virtual_offset, raw.physical_offset, raw.length),
                })
            }
            _ => Ok(RawChunk::Current(opts.deserialize(bytes)?)),
        }
    }

    /// Append the encoded record to `out`
    pub fn encode_into(&self, out: &mut BytesMut) -> Result<()> {
        let opts = wire_options();
        match *self {
            RawChunk::Legacy {
                split_file_index,
                record,
            } => opts.serialize_into(
                (&mut *out).writer(),
                &LegacyChunk {
                    split_file_index,
                    virtual_offset: record.virtual_offset,
                    physical_offset: record.physical_offset,
                    length: record.length,
                },
            )?,
            RawChunk::Current(record) => opts.serialize_into((&mut *out).writer(), &record)?,
        }
        Ok(())
    }

    /// Collapse into the canonical record.
    ///
    /// Data living in another part file cannot be addressed by a single
    /// stream, so a non-zero split index is refused.
    pub fn into_record(self) -> Result<ChunkRecord> {
        match self {
            RawChunk::Legacy {
                split_file_index: 0,
                record,
            } => Ok(record),
            RawChunk::Legacy {
                split_file_index, ..
            } => Err(WdfError::SplitContainer {
                parts: split_file_index + 1,
            }),
            RawChunk::Current(record) => Ok(record),
        }
    }
}
