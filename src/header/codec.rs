//! Header Codec
//!
//! Raw on-disk header layouts and the conversion to/from [`Header`].

use std::io::{self, Read};

use bincode::Options;
use bytes::Buf;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WdfError};

use super::{
    compatible_version_for, header_size_for, Header, FLAG_FINALIZED, HEADER_SIZE_V1,
    HEADER_SIZE_V2, HEADER_SIZE_V3, MAGIC, MAGIC_SIZE, MAX_HEADER_SIZE, MAX_SUPPORTED_VERSION,
};

/// Magic (8) + version (4) + header size or split id (4)
const PREFIX_SIZE: usize = 16;

/// Fixed-width big-endian bincode options shared by headers and records
pub(crate) fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

// =============================================================================
// Raw Layouts
// =============================================================================

/// Legacy v1 header (52 bytes)
#[derive(Debug, Serialize, Deserialize)]
struct RawHeaderV1 {
    magic: [u8; 8],
    format_version: u32,
    split_file_id: u32,
    split_file_count: u32,
    virtual_size: u64,
    physical_data_size: u64,
    table_split_file: u32,
    chunk_count: u32,
    table_offset: u64,
}

/// v2 header (56 bytes), also the first part of every later generation
#[derive(Debug, Serialize, Deserialize)]
struct RawHeaderV2 {
    magic: [u8; 8],
    format_version: u32,
    header_size: u32,
    align_factor: u32,
    compatible_version: u32,
    virtual_size: u64,
    physical_data_size: u64,
    reserved: u32,
    chunk_count: u32,
    table_offset: u64,
}

/// Fields appended by v3 (8 bytes)
#[derive(Debug, Serialize, Deserialize)]
struct RawHeaderExt {
    flags: u32,
    table_crc: u32,
}

// =============================================================================
// Decoding
// =============================================================================

pub(super) fn decode(bytes: &[u8]) -> Result<Header> {
    require(bytes, MAGIC_SIZE as usize)?;
    check_magic(bytes)?;
    require(bytes, 12)?;

    let version = (&bytes[8..12]).get_u32();
    match version {
        0 => Err(WdfError::InvalidHeader("format version 0".to_string())),
        1 => decode_v1(bytes),
        _ => decode_v2_plus(version, bytes),
    }
}

fn decode_v1(bytes: &[u8]) -> Result<Header> {
    require(bytes, HEADER_SIZE_V1 as usize)?;
    let raw: RawHeaderV1 = wire_options().deserialize(&bytes[..HEADER_SIZE_V1 as usize])?;

    if raw.split_file_count > 1 {
        return Err(WdfError::SplitContainer {
            parts: raw.split_file_count,
        });
    }
    if raw.split_file_id != 0 || raw.table_split_file != 0 {
        return Err(WdfError::SplitContainer {
            parts: raw.split_file_id.max(raw.table_split_file) + 1,
        });
    }

    Ok(Header {
        format_version: 1,
        header_size: HEADER_SIZE_V1,
        align_factor: 0,
        compatible_version: 1,
        virtual_size: raw.virtual_size,
        physical_data_size: raw.physical_data_size,
        chunk_count: raw.chunk_count,
        table_offset: raw.table_offset,
        finalized: false,
        table_crc: 0,
    })
}

fn decode_v2_plus(version: u32, bytes: &[u8]) -> Result<Header> {
    require(bytes, HEADER_SIZE_V2 as usize)?;
    let raw: RawHeaderV2 = wire_options().deserialize(&bytes[..HEADER_SIZE_V2 as usize])?;

    // Checked before anything else: a newer writer may have changed the
    // meaning of fields we would otherwise happily parse.
    if raw.compatible_version > MAX_SUPPORTED_VERSION {
        return Err(WdfError::IncompatibleVersion {
            compatible: raw.compatible_version,
            supported: MAX_SUPPORTED_VERSION,
        });
    }
    if raw.compatible_version == 0 || raw.compatible_version > version {
        return Err(WdfError::InvalidHeader(format!(
            "compatible version {} does not fit format version {}",
            raw.compatible_version, version
        )));
    }
    if raw.header_size < HEADER_SIZE_V2 || raw.header_size > MAX_HEADER_SIZE {
        return Err(WdfError::InvalidHeader(format!(
            "header size {} out of range",
            raw.header_size
        )));
    }
    if raw.align_factor != 0 && !raw.align_factor.is_power_of_two() {
        return Err(WdfError::InvalidHeader(format!(
            "align factor {} is not a power of two",
            raw.align_factor
        )));
    }

    let (finalized, table_crc) = if version >= 3 {
        if raw.header_size < HEADER_SIZE_V3 {
            return Err(WdfError::InvalidHeader(format!(
                "v{} header too small: {} bytes",
                version, raw.header_size
            )));
        }
        require(bytes, HEADER_SIZE_V3 as usize)?;
        let ext: RawHeaderExt = wire_options()
            .deserialize(&bytes[HEADER_SIZE_V2 as usize..HEADER_SIZE_V3 as usize])?;
        (ext.flags & FLAG_FINALIZED != 0, ext.table_crc)
    } else {
        (false, 0)
    };

    Ok(Header {
        format_version: version,
        header_size: raw.header_size,
        align_factor: raw.align_factor,
        compatible_version: raw.compatible_version,
        virtual_size: raw.virtual_size,
        physical_data_size: raw.physical_data_size,
        chunk_count: raw.chunk_count,
        table_offset: raw.table_offset,
        finalized,
        table_crc,
    })
}

fn check_magic(bytes: &[u8]) -> Result<()> {
    if &bytes[..MAGIC_SIZE as usize] != MAGIC {
        let mut found = [0u8; 8];
        found.copy_from_slice(&bytes[..MAGIC_SIZE as usize]);
        return Err(WdfError::InvalidMagic(found));
    }
    Ok(())
}

fn require(bytes: &[u8], len: usize) -> Result<()> {
    if bytes.len() < len {
        return Err(WdfError::InvalidHeader(format!(
            "truncated header: expected {} bytes, got {}",
            len,
            bytes.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Encoding
// =============================================================================

pub(super) fn encode(header: &Header) -> Result<Vec<u8>> {
    match header.format_version {
        1 => Ok(wire_options().serialize(&RawHeaderV1 {
            magic: *MAGIC,
            format_version: 1,
            split_file_id: 0,
            split_file_count: 1,
            virtual_size: header.virtual_size,
            physical_data_size: header.physical_data_size,
            table_split_file: 0,
            chunk_count: header.chunk_count,
            table_offset: header.table_offset,
        })?),
        v @ 2..=MAX_SUPPORTED_VERSION => {
            let mut out = wire_options().serialize(&RawHeaderV2 {
                magic: *MAGIC,
                format_version: v,
                header_size: header_size_for(v),
                align_factor: header.align_factor,
                compatible_version: compatible_version_for(v),
                virtual_size: header.virtual_size,
                physical_data_size: header.physical_data_size,
                reserved: 0,
                chunk_count: header.chunk_count,
                table_offset: header.table_offset,
            })?;
            if v >= 3 {
                let flags = if header.finalized { FLAG_FINALIZED } else { 0 };
                out.extend_from_slice(&wire_options().serialize(&RawHeaderExt {
                    flags,
                    table_crc: header.table_crc,
                })?);
            }
            Ok(out)
        }
        v => Err(WdfError::InvalidHeader(format!(
            "cannot encode format version {}",
            v
        ))),
    }
}

// =============================================================================
// Stream Reading
// =============================================================================

pub(super) fn read_from<R: Read>(reader: &mut R) -> Result<Header> {
    let mut buf = Vec::with_capacity(HEADER_SIZE_V3 as usize);
    reader.by_ref().take(PREFIX_SIZE as u64).read_to_end(&mut buf)?;

    if buf.len() >= MAGIC_SIZE as usize {
        check_magic(&buf)?;
    } else if !MAGIC.starts_with(&buf) {
        // Too short for a full magic, but already not ours
        let mut found = [0u8; 8];
        found[..buf.len()].copy_from_slice(&buf);
        return Err(WdfError::InvalidMagic(found));
    }
    require(&buf, PREFIX_SIZE)?;

    let mut prefix = &buf[MAGIC_SIZE as usize..PREFIX_SIZE];
    let version = prefix.get_u32();
    let declared = prefix.get_u32();

    let total = match version {
        0 => return decode(&buf),
        1 => HEADER_SIZE_V1,
        _ if (HEADER_SIZE_V2..=MAX_HEADER_SIZE).contains(&declared) => declared,
        // Let decode() report the bad size (or the version gate) on the base layout
        _ => HEADER_SIZE_V2,
    } as usize;

    buf.resize(total, 0);
    reader.read_exact(&mut buf[PREFIX_SIZE..]).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            WdfError::InvalidHeader("truncated header".to_string())
        } else {
            WdfError::Io(e)
        }
    })?;

    decode(&buf)
}
