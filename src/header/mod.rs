//! Container Header Module
//!
//! Fixed-size container header in three on-disk generations.
//!
//! ## Responsibilities
//! - Big-endian encode/decode of every header generation
//! - Magic validation (is this a WDF file at all?)
//! - Compatible-version gate for files written by newer engines
//! - Distinguish provisional (abandoned) headers from committed ones
//!
//! ## File Format (v3)
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Magic "\x01WDFDISC" (8)                                      │
//! │ FormatVersion u32 │ HeaderSize u32 │ Align u32 │ Compat u32  │
//! │ VirtualSize u64   │ DataSize u64                             │
//! │ Reserved u32      │ ChunkCount u32 │ TableOffset u64         │
//! │ Flags u32         │ TableCRC u32          (v3 only)          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! v2 is the same layout without the last row (56 bytes). v1 is the legacy
//! 52-byte layout carrying split-file fields and no align/compat fields.

mod codec;

pub(crate) use codec::wire_options;

use crate::chunk;
use crate::error::{Result, WdfError};

// =============================================================================
// Shared Constants
// =============================================================================

/// Signature at offset 0 and again in front of the chunk table.
///
/// The leading control byte can never start a printable disc ID.
pub const MAGIC: &[u8; 8] = b"\x01WDFDISC";

/// Size of [`MAGIC`]
pub const MAGIC_SIZE: u64 = 8;

/// Generation written by default
pub const CURRENT_VERSION: u32 = 3;

/// Highest `compatible_version` this engine can read
pub const MAX_SUPPORTED_VERSION: u32 = 3;

/// Upper bound on `header_size` accepted from disk
pub const MAX_HEADER_SIZE: u32 = 4096;

/// Header sizes per generation
pub const HEADER_SIZE_V1: u32 = 52;
pub const HEADER_SIZE_V2: u32 = 56;
pub const HEADER_SIZE_V3: u32 = 64;

/// Bookkeeping cost of a hole on top of the record it splits off
pub const HOLE_MARKER_SIZE: u64 = 8;

/// v3 flag: header was rewritten by a successful close
pub const FLAG_FINALIZED: u32 = 0x1;

/// Header size written for a generation
pub fn header_size_for(format_version: u32) -> u32 {
    match format_version {
        1 => HEADER_SIZE_V1,
        2 => HEADER_SIZE_V2,
        _ => HEADER_SIZE_V3,
    }
}

/// Lowest reader version able to parse a file of this generation.
///
/// v3 only appends optional fields to v2, so v2 readers can still read it.
pub fn compatible_version_for(format_version: u32) -> u32 {
    match format_version {
        1 => 1,
        _ => 2,
    }
}

/// Zero-run length at which eliding a hole beats storing the zeros:
/// one extra chunk record plus the hole marker.
pub fn min_hole_size(format_version: u32) -> u64 {
    chunk::record_size(format_version) + HOLE_MARKER_SIZE
}

// =============================================================================
// Header
// =============================================================================

/// Host representation of a container header (any generation)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Generation; selects header and chunk-record layout
    pub format_version: u32,
    /// Bytes occupied by the header on disk
    pub header_size: u32,
    /// Physical chunk alignment (0 = none)
    pub align_factor: u32,
    /// Minimum reader version required
    pub compatible_version: u32,
    /// Length of the reconstructed stream
    pub virtual_size: u64,
    /// Sum of all chunk lengths
    pub physical_data_size: u64,
    /// Number of chunk records
    pub chunk_count: u32,
    /// Physical offset of the repeated magic + chunk table
    pub table_offset: u64,
    /// Commit flag (v3); always false for older generations
    pub finalized: bool,
    /// CRC-32 of the serialized records (v3)
    pub table_crc: u32,
}

impl Header {
    /// Provisional header written at session open
    pub fn new(format_version: u32, align_factor: u32) -> Self {
        Self {
            format_version,
            header_size: header_size_for(format_version),
            align_factor,
            compatible_version: compatible_version_for(format_version),
            virtual_size: 0,
            physical_data_size: 0,
            chunk_count: 0,
            table_offset: 0,
            finalized: false,
            table_crc: 0,
        }
    }

    /// Decode a header from its on-disk bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes)
    }

    /// Encode the header in the layout of its `format_version`
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }

    /// Read and decode a header from the start of a stream
    pub fn read_from<R: std::io::Read>(reader: &mut R) -> Result<Self> {
        codec::read_from(reader)
    }

    /// First physical byte after the header
    pub fn data_start(&self) -> u64 {
        self.header_size as u64
    }

    /// Reject headers left behind by a writer that never closed
    pub fn check_committed(&self) -> Result<()> {
        if self.table_offset < self.data_start() {
            return Err(WdfError::Incomplete);
        }
        if self.format_version >= 3 && !self.finalized {
            return Err(WdfError::Incomplete);
        }
        Ok(())
    }
}
