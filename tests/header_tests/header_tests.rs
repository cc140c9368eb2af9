//! Tests for the Header Codec
//!
//! These tests verify:
//! - Encode/decode of every header generation
//! - Magic validation (not-this-format is recoverable)
//! - Compatible-version rejection on open
//! - Provisional vs committed headers

use std::io::Cursor;

use wdfkit::header::{
    self, Header, HEADER_SIZE_V1, HEADER_SIZE_V2, HEADER_SIZE_V3, MAGIC, MAX_SUPPORTED_VERSION,
};
use wdfkit::{Config, WdfError, WdfReader, WdfWriter};

// =============================================================================
// Helper Functions
// =============================================================================

/// Build a small committed container in memory
fn container_bytes(format_version: u32) -> Vec<u8> {
    let config = Config::builder().format_version(format_version).build();
    let mut writer = WdfWriter::new(Cursor::new(Vec::new()), &config).unwrap();
    writer.write_literal(0, &[0x11; 64]).unwrap();
    writer.write_zero(64, 4096).unwrap();
    writer.write_literal(4160, &[0x22; 64]).unwrap();
    let (cursor, _) = writer.finish().unwrap();
    cursor.into_inner()
}

fn open(bytes: Vec<u8>) -> wdfkit::Result<WdfReader<Cursor<Vec<u8>>>> {
    WdfReader::new(Cursor::new(bytes))
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_header_sizes_per_generation() {
    assert_eq!(header::header_size_for(1), HEADER_SIZE_V1);
    assert_eq!(header::header_size_for(2), HEADER_SIZE_V2);
    assert_eq!(header::header_size_for(3), HEADER_SIZE_V3);
}

#[test]
fn test_magic_starts_with_control_byte() {
    assert!(MAGIC[0].is_ascii_control());
    assert_eq!(MAGIC.len(), 8);
}

#[test]
fn test_compatible_version_written_is_lowest_possible() {
    for (version, compat) in [(1, 1), (2, 2), (3, 2)] {
        let bytes = container_bytes(version);
        let reader = open(bytes).unwrap();
        assert_eq!(reader.header().format_version, version);
        assert_eq!(reader.header().compatible_version, compat);
    }
}

#[test]
fn test_new_header_is_provisional() {
    let h = Header::new(3, 0);
    assert_eq!(h.virtual_size, 0);
    assert_eq!(h.chunk_count, 0);
    assert!(!h.finalized);
    assert!(matches!(h.check_committed(), Err(WdfError::Incomplete)));
}

#[test]
fn test_encode_decode_preserves_fields() {
    let mut h = Header::new(2, 2048);
    h.virtual_size = 4_699_979_776;
    h.physical_data_size = 123_456;
    h.chunk_count = 17;
    h.table_offset = 2048 + 123_456;

    let decoded = Header::decode(&h.encode().unwrap()).unwrap();
    assert_eq!(decoded, h);
    assert!(decoded.check_committed().is_ok());
}

#[test]
fn test_min_hole_size_tracks_record_size() {
    assert_eq!(header::min_hole_size(1), 28 + 8);
    assert_eq!(header::min_hole_size(2), 24 + 8);
    assert_eq!(header::min_hole_size(3), 24 + 8);
}

// =============================================================================
// Rejection Tests
// =============================================================================

#[test]
fn test_compatible_version_one_above_max_is_rejected() {
    let mut bytes = container_bytes(3);
    bytes[20..24].copy_from_slice(&(MAX_SUPPORTED_VERSION + 1).to_be_bytes());

    match open(bytes) {
        Err(WdfError::IncompatibleVersion {
            compatible,
            supported,
        }) => {
            assert_eq!(compatible, MAX_SUPPORTED_VERSION + 1);
            assert_eq!(supported, MAX_SUPPORTED_VERSION);
        }
        Err(e) => panic!("expected IncompatibleVersion, got {}", e),
        Ok(_) => panic!("expected IncompatibleVersion, got a reader"),
    }
}

#[test]
fn test_wrong_magic_is_not_this_format() {
    let mut bytes = container_bytes(3);
    bytes[..4].copy_from_slice(b"CISO");

    let err = open(bytes).err().unwrap();
    assert!(err.is_not_this_format());
}

#[test]
fn test_zero_format_version_is_invalid() {
    let mut bytes = container_bytes(2);
    bytes[8..12].copy_from_slice(&0u32.to_be_bytes());

    assert!(matches!(open(bytes), Err(WdfError::InvalidHeader(_))));
}

#[test]
fn test_header_size_below_layout_is_invalid() {
    let mut bytes = container_bytes(3);
    bytes[12..16].copy_from_slice(&40u32.to_be_bytes());

    assert!(matches!(open(bytes), Err(WdfError::InvalidHeader(_))));
}

#[test]
fn test_v3_without_finalized_flag_is_incomplete() {
    let mut bytes = container_bytes(3);
    // flags live right after the v2 layout
    bytes[56..60].copy_from_slice(&0u32.to_be_bytes());

    assert!(matches!(open(bytes), Err(WdfError::Incomplete)));
}

#[test]
fn test_v1_split_container_is_reported() {
    let mut bytes = container_bytes(1);
    bytes[16..20].copy_from_slice(&2u32.to_be_bytes());

    assert!(matches!(
        open(bytes),
        Err(WdfError::SplitContainer { parts: 2 })
    ));
}

#[test]
fn test_short_foreign_input_is_not_this_format() {
    let inputs: [&[u8]; 3] = [b"CISO", b"W", b"\x01WDX"];
    for input in inputs {
        let err = open(input.to_vec()).err().unwrap();
        assert!(err.is_not_this_format(), "input {:?}", input);
    }
}

#[test]
fn test_short_wdf_prefix_is_invalid_header() {
    // Nothing to compare, or the start of a real magic cut short
    let inputs: [&[u8]; 3] = [b"", b"\x01WDF", b"\x01WDFDISC\0\0"];
    for input in inputs {
        assert!(
            matches!(open(input.to_vec()), Err(WdfError::InvalidHeader(_))),
            "input {:?}",
            input
        );
    }
}
