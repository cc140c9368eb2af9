//! WDF Reader
//!
//! Opens a committed container and serves reads of its virtual stream.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::chunk::{record_size, ChunkTable, Lookup, TableCursor};
use crate::error::{Result, WdfError};
use crate::header::{Header, MAGIC, MAGIC_SIZE};

use super::blocks::{next_block, DataBlocks};
use super::DataBlock;

/// Comparison granularity for `verify_against`
const VERIFY_BLOCK: usize = 1024 * 1024;

/// Reader for WDF containers with the chunk table resident in memory
pub struct WdfReader<R: Read + Seek> {
    /// Physical stream
    inner: R,
    header: Header,
    /// Immutable after open; shared with `SharedReader` handles
    table: Arc<ChunkTable>,
    /// Speeds up sequential lookups
    cursor: TableCursor,
    /// Known physical position of `inner`, to skip redundant seeks
    physical_pos: Option<u64>,
    /// Virtual position for the `io::Read`/`io::Seek` adapter
    position: u64,
}

impl WdfReader<BufReader<File>> {
    /// Open a container file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = Self::new(BufReader::new(file)).map_err(|e| {
            if !e.is_not_this_format() {
                warn!(path = %path.display(), error = %e, "rejected WDF container");
            }
            e
        })?;

        debug!(path = %path.display(), "opened WDF container");
        Ok(reader)
    }
}

impl<R: Read + Seek> WdfReader<R> {
    /// Load and validate header and chunk table from any seekable stream
    pub fn new(mut inner: R) -> Result<Self> {
        inner.seek(SeekFrom::Start(0))?;
        let header = Header::read_from(&mut inner)?;
        header.check_committed()?;

        let table = Self::load_table(&mut inner, &header)?;

        debug!(
            format_version = header.format_version,
            virtual_size = header.virtual_size,
            physical_data_size = header.physical_data_size,
            chunk_count = header.chunk_count,
            "loaded WDF chunk table"
        );

        Ok(Self {
            inner,
            header,
            table: Arc::new(table),
            cursor: TableCursor::new(),
            physical_pos: None,
            position: 0,
        })
    }

    fn load_table(inner: &mut R, header: &Header) -> Result<ChunkTable> {
        let table_len = (header.chunk_count as u64)
            .checked_mul(record_size(header.format_version))
            .ok_or_else(|| WdfError::InvalidTable("table size overflows".to_string()))?;
        let expected_end = header
            .table_offset
            .checked_add(MAGIC_SIZE)
            .and_then(|v| v.checked_add(table_len))
            .ok_or_else(|| WdfError::InvalidTable("table offset overflows".to_string()))?;

        let file_end = inner.seek(SeekFrom::End(0))?;
        if expected_end > file_end {
            return Err(WdfError::InvalidTable(format!(
                "table ends at {} past end of file {}",
                expected_end, file_end
            )));
        }
        if expected_end < file_end {
            return Err(WdfError::InvalidTable(format!(
                "{} trailing bytes after chunk table",
                file_end - expected_end
            )));
        }

        inner.seek(SeekFrom::Start(header.table_offset))?;
        let mut magic = [0u8; MAGIC_SIZE as usize];
        inner.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(WdfError::InvalidTable(format!(
                "missing table magic at {}",
                header.table_offset
            )));
        }

        let mut encoded = vec![0u8; table_len as usize];
        inner.read_exact(&mut encoded)?;

        if header.format_version >= 3 {
            let crc = ChunkTable::checksum(&encoded);
            if crc != header.table_crc {
                return Err(WdfError::InvalidTable(format!(
                    "table checksum mismatch: stored {:08x}, computed {:08x}",
                    header.table_crc, crc
                )));
            }
        }

        let table = ChunkTable::decode(&encoded, header.format_version, header.chunk_count)?;
        table.validate(header)?;
        Ok(table)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read `length` virtual bytes starting at `virtual_offset`
    pub fn read(&mut self, virtual_offset: u64, length: u64) -> Result<Vec<u8>> {
        self.check_range(virtual_offset, length)?;
        let mut buf = vec![0u8; length as usize];
        self.read_at(virtual_offset, &mut buf)?;
        Ok(buf)
    }

    /// Fill `buf` from `virtual_offset`; holes read as zeros
    pub fn read_at(&mut self, virtual_offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(virtual_offset, buf.len() as u64)?;

        let mut pos = virtual_offset;
        let mut done = 0usize;

        while done < buf.len() {
            let remaining = (buf.len() - done) as u64;

            let n = match self.cursor.resolve(&self.table, pos) {
                Lookup::Inside(i) => {
                    let chunk = self.table[i];
                    let n = (chunk.end() - pos).min(remaining) as usize;
                    self.read_physical(chunk.physical_at(pos), &mut buf[done..done + n])?;
                    n
                }
                Lookup::Gap(i) => {
                    let gap_end = self
                        .table
                        .get(i)
                        .map_or(self.header.virtual_size, |c| c.virtual_offset);
                    let n = (gap_end - pos).min(remaining) as usize;
                    buf[done..done + n].fill(0);
                    n
                }
            };

            pos += n as u64;
            done += n;
        }

        Ok(())
    }

    /// Next run of real bytes at or after `virtual_offset`, `None` at end of stream
    pub fn next_data_block(&self, virtual_offset: u64, alignment_hint: u64) -> Option<DataBlock> {
        next_block(
            &self.table,
            self.header.virtual_size,
            virtual_offset,
            alignment_hint,
        )
    }

    /// Iterate every data block from the start of the stream
    pub fn blocks(&self, alignment_hint: u64) -> DataBlocks<'_> {
        DataBlocks::new(&self.table, self.header.virtual_size, alignment_hint)
    }

    /// Compare the whole virtual stream with `source`, byte for byte
    pub fn verify_against<S: Read>(&mut self, source: &mut S) -> Result<()> {
        let virtual_size = self.header.virtual_size;
        let mut expected = vec![0u8; VERIFY_BLOCK];
        let mut actual = vec![0u8; VERIFY_BLOCK];
        let mut offset = 0u64;

        loop {
            let n = read_full(source, &mut expected)?;
            if n == 0 {
                break;
            }
            if n as u64 > virtual_size - offset {
                return Err(WdfError::Mismatch(format!(
                    "source is longer than virtual size {}",
                    virtual_size
                )));
            }

            self.read_at(offset, &mut actual[..n])?;
            if let Some(at) = expected[..n]
                .iter()
                .zip(&actual[..n])
                .position(|(a, b)| a != b)
            {
                return Err(WdfError::Mismatch(format!(
                    "content differs at offset {}",
                    offset + at as u64
                )));
            }
            offset += n as u64;
        }

        if offset != virtual_size {
            return Err(WdfError::Mismatch(format!(
                "source ends at {}, virtual size is {}",
                offset, virtual_size
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn table(&self) -> &ChunkTable {
        &self.table
    }

    /// Another handle on the loaded table, usable without this reader
    pub(crate) fn table_handle(&self) -> Arc<ChunkTable> {
        Arc::clone(&self.table)
    }

    pub fn virtual_size(&self) -> u64 {
        self.header.virtual_size
    }

    /// Give back the physical stream
    pub fn into_inner(self) -> R {
        self.inner
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn check_range(&self, virtual_offset: u64, length: u64) -> Result<()> {
        match virtual_offset.checked_add(length) {
            Some(end) if end <= self.header.virtual_size => Ok(()),
            _ => Err(WdfError::OutOfRange {
                offset: virtual_offset,
                len: length,
                virtual_size: self.header.virtual_size,
            }),
        }
    }

    fn read_physical(&mut self, physical_offset: u64, buf: &mut [u8]) -> Result<()> {
        if self.physical_pos != Some(physical_offset) {
            self.inner.seek(SeekFrom::Start(physical_offset))?;
        }
        // Unknown after a failed read
        self.physical_pos = None;
        self.inner.read_exact(buf)?;
        self.physical_pos = Some(physical_offset + buf.len() as u64);
        Ok(())
    }
}

/// Read until `buf` is full or EOF
fn read_full<S: Read>(source: &mut S, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

// =============================================================================
// Virtual Stream Adapter
// =============================================================================

impl<R: Read + Seek> Read for WdfReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let virtual_size = self.header.virtual_size;
        if self.position >= virtual_size || buf.is_empty() {
            return Ok(0);
        }

        let n = (virtual_size - self.position).min(buf.len() as u64) as usize;
        self.read_at(self.position, &mut buf[..n])?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for WdfReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(d) => self.header.virtual_size.checked_add_signed(d),
            SeekFrom::Current(d) => self.position.checked_add_signed(d),
        };

        match target {
            Some(n) => {
                self.position = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}
