//! Tests for the Read Engine
//!
//! These tests verify:
//! - Reads spanning chunks and holes
//! - Range checks and corrupted-table rejection
//! - Data block iteration with and without merge hint
//! - io::Read / io::Seek adapter
//! - Shared access from several threads

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::thread;

use wdfkit::reader::DataBlock;
use wdfkit::{Config, SharedReader, WdfError, WdfReader, WdfWriter};

// =============================================================================
// Helper Functions
// =============================================================================

type MemReader = WdfReader<Cursor<Vec<u8>>>;

/// Container with data at 1000..1100 ("A") and 5000..5050 ("B"), 8192 bytes total
fn sample_bytes(format_version: u32) -> Vec<u8> {
    let config = Config::builder().format_version(format_version).build();
    let mut writer = WdfWriter::new(Cursor::new(Vec::new()), &config).unwrap();
    writer.write_zero(0, 1000).unwrap();
    writer.write_literal(1000, &[b'A'; 100]).unwrap();
    writer.write_literal(5000, &[b'B'; 50]).unwrap();
    writer.set_virtual_size(8192).unwrap();
    let (cursor, _) = writer.finish().unwrap();
    cursor.into_inner()
}

fn sample(format_version: u32) -> MemReader {
    WdfReader::new(Cursor::new(sample_bytes(format_version))).unwrap()
}

/// The image `sample` reconstructs
fn sample_image() -> Vec<u8> {
    let mut image = vec![0u8; 8192];
    image[1000..1100].fill(b'A');
    image[5000..5050].fill(b'B');
    image
}

// =============================================================================
// Read Tests
// =============================================================================

#[test]
fn test_full_read_matches_image() {
    for version in 1..=3 {
        let mut reader = sample(version);
        assert_eq!(reader.read(0, 8192).unwrap(), sample_image(), "v{}", version);
    }
}

#[test]
fn test_read_across_chunk_and_hole_boundaries() {
    let mut reader = sample(3);
    let image = sample_image();

    for (offset, len) in [(990, 20), (1090, 20), (1099, 3902), (4999, 2), (5049, 3143)] {
        assert_eq!(
            reader.read(offset, len).unwrap(),
            image[offset as usize..(offset + len) as usize],
            "read({}, {})",
            offset,
            len
        );
    }
}

#[test]
fn test_hole_reads_are_zero() {
    let mut reader = sample(3);
    assert_eq!(reader.read(2000, 10).unwrap(), vec![0; 10]);
    assert_eq!(reader.read(8000, 192).unwrap(), vec![0; 192]);
}

#[test]
fn test_empty_read_at_end_is_allowed() {
    let mut reader = sample(3);
    assert!(reader.read(8192, 0).unwrap().is_empty());
}

#[test]
fn test_read_past_end_is_out_of_range() {
    let mut reader = sample(3);
    assert!(matches!(
        reader.read(8190, 4),
        Err(WdfError::OutOfRange {
            offset: 8190,
            len: 4,
            virtual_size: 8192
        })
    ));
    assert!(matches!(
        reader.read(u64::MAX, 2),
        Err(WdfError::OutOfRange { .. })
    ));
}

#[test]
fn test_reads_after_out_of_range_still_work() {
    let mut reader = sample(3);
    assert!(reader.read(9000, 1).is_err());
    assert_eq!(reader.read(1000, 1).unwrap(), vec![b'A']);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_trailing_bytes_after_table_are_rejected() {
    let mut bytes = sample_bytes(3);
    bytes.extend_from_slice(&[0; 16]);
    assert!(matches!(
        WdfReader::new(Cursor::new(bytes)),
        Err(WdfError::InvalidTable(_))
    ));
}

#[test]
fn test_truncated_table_is_rejected() {
    let mut bytes = sample_bytes(2);
    bytes.truncate(bytes.len() - 1);
    assert!(matches!(
        WdfReader::new(Cursor::new(bytes)),
        Err(WdfError::InvalidTable(_))
    ));
}

#[test]
fn test_missing_table_magic_is_rejected() {
    let reader = sample(2);
    let table_offset = reader.header().table_offset as usize;
    let mut bytes = reader.into_inner().into_inner();
    bytes[table_offset] ^= 0xFF;

    assert!(matches!(
        WdfReader::new(Cursor::new(bytes)),
        Err(WdfError::InvalidTable(_))
    ));
}

#[test]
fn test_v2_table_with_bad_ordering_is_rejected() {
    let mut bytes = sample_bytes(2);
    // second record's virtual offset (first field) moved into the first chunk
    let second = bytes.len() - 24;
    bytes[second..second + 8].copy_from_slice(&1010u64.to_be_bytes());

    assert!(matches!(
        WdfReader::new(Cursor::new(bytes)),
        Err(WdfError::InvalidTable(_))
    ));
}

#[test]
fn test_v3_table_checksum_mismatch_is_rejected() {
    let mut bytes = sample_bytes(3);
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    match WdfReader::new(Cursor::new(bytes)) {
        Err(WdfError::InvalidTable(msg)) => assert!(msg.contains("checksum")),
        Err(e) => panic!("expected InvalidTable, got {}", e),
        Ok(_) => panic!("expected InvalidTable, got a reader"),
    }
}

// =============================================================================
// Data Block Tests
// =============================================================================

#[test]
fn test_blocks_list_each_chunk() {
    let reader = sample(3);
    let blocks: Vec<_> = reader.blocks(0).collect();
    assert_eq!(
        blocks,
        vec![
            DataBlock { offset: 1000, length: 100 },
            DataBlock { offset: 5000, length: 50 },
        ]
    );
}

#[test]
fn test_hint_merges_blocks() {
    let reader = sample(3);
    let blocks: Vec<_> = reader.blocks(4096).collect();
    assert_eq!(blocks, vec![DataBlock { offset: 1000, length: 4050 }]);
}

#[test]
fn test_next_data_block_from_offsets() {
    let reader = sample(3);
    assert_eq!(
        reader.next_data_block(0, 0),
        Some(DataBlock { offset: 1000, length: 100 })
    );
    assert_eq!(
        reader.next_data_block(1050, 0),
        Some(DataBlock { offset: 1050, length: 50 })
    );
    assert_eq!(
        reader.next_data_block(1100, 0),
        Some(DataBlock { offset: 5000, length: 50 })
    );
    // Trailing hole: no more data
    assert_eq!(reader.next_data_block(5050, 0), None);
    assert_eq!(reader.next_data_block(8192, 0), None);
}

// =============================================================================
// Stream Adapter Tests
// =============================================================================

#[test]
fn test_read_to_end_reconstructs_image() {
    let mut reader = sample(3);
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, sample_image());
}

#[test]
fn test_seek_then_read() {
    let mut reader = sample(3);

    assert_eq!(reader.seek(SeekFrom::Start(995)).unwrap(), 995);
    let mut buf = [0u8; 10];
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"\0\0\0\0\0AAAAA");

    assert_eq!(reader.seek(SeekFrom::End(-50)).unwrap(), 8142);
    assert_eq!(reader.seek(SeekFrom::Current(-3142)).unwrap(), 5000);
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"BBBBBBBBBB");

    assert!(reader.seek(SeekFrom::Current(-10_000)).is_err());
}

#[test]
fn test_read_past_end_returns_zero_bytes() {
    let mut reader = sample(3);
    reader.seek(SeekFrom::Start(10_000)).unwrap();
    let mut buf = [0u8; 4];
    // inherent `read` takes a range, so call the trait method explicitly
    assert_eq!(Read::read(&mut reader, &mut buf).unwrap(), 0);
}

// =============================================================================
// Shared Reader Tests
// =============================================================================

#[test]
fn test_shared_reader_across_threads() {
    let shared = Arc::new(SharedReader::new(sample(3)));
    let image = Arc::new(sample_image());

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let shared = Arc::clone(&shared);
            let image = Arc::clone(&image);
            thread::spawn(move || {
                for i in 0..64u64 {
                    let offset = (t * 997 + i * 127) % 8000;
                    let got = shared.read(offset, 100).unwrap();
                    assert_eq!(got, image[offset as usize..offset as usize + 100]);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(shared.virtual_size(), 8192);
    assert_eq!(
        shared.next_data_block(0, 0),
        Some(DataBlock { offset: 1000, length: 100 })
    );
}

#[test]
fn test_shared_block_queries_match_reader() {
    let reader = sample(3);
    let expected: Vec<_> = reader.blocks(0).collect();
    let shared = SharedReader::new(reader);

    assert_eq!(shared.blocks(0).collect::<Vec<_>>(), expected);
    assert_eq!(shared.table().len(), 2);
    assert_eq!(
        shared.next_data_block(1100, 0),
        Some(DataBlock { offset: 5000, length: 50 })
    );
    assert_eq!(shared.next_data_block(5050, 0), None);
}

// =============================================================================
// Verification Tests
// =============================================================================

#[test]
fn test_verify_against_matching_image() {
    let mut reader = sample(3);
    reader.verify_against(&mut Cursor::new(sample_image())).unwrap();
}

#[test]
fn test_verify_against_reports_first_difference() {
    let mut reader = sample(3);
    let mut image = sample_image();
    image[5020] = b'X';

    match reader.verify_against(&mut Cursor::new(image)) {
        Err(WdfError::Mismatch(msg)) => assert!(msg.contains("5020")),
        other => panic!("expected Mismatch, got {:?}", other),
    }
}

#[test]
fn test_verify_against_wrong_length() {
    let mut reader = sample(3);
    let mut longer = sample_image();
    longer.push(0);
    assert!(matches!(
        reader.verify_against(&mut Cursor::new(longer)),
        Err(WdfError::Mismatch(_))
    ));

    let shorter = sample_image()[..4096].to_vec();
    assert!(matches!(
        reader.verify_against(&mut Cursor::new(shorter)),
        Err(WdfError::Mismatch(_))
    ));
}
