//! Chunk Table
//!
//! Append-only, sorted list of chunk records with O(log n) lookups.

use bytes::{Bytes, BytesMut};

use crate::error::{Result, WdfError};
use crate::header::Header;

use super::{record_size, ChunkRecord, RawChunk};

/// Where a virtual offset falls relative to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Inside chunk `i`
    Inside(usize),
    /// In the hole before chunk `i` (`i == len` means after the last chunk)
    Gap(usize),
}

impl Lookup {
    pub fn index(&self) -> usize {
        match *self {
            Lookup::Inside(i) | Lookup::Gap(i) => i,
        }
    }
}

/// In-memory chunk table owned by one open session
#[derive(Debug, Clone, Default)]
pub struct ChunkTable {
    /// Records, strictly increasing by virtual offset
    records: Vec<ChunkRecord>,
    /// Running sum of record lengths
    data_size: u64,
}

impl ChunkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            data_size: 0,
        }
    }

    /// Append a record after every existing one.
    ///
    /// The record must be non-empty and start at or after the current end.
    pub fn append(&mut self, record: ChunkRecord) -> Result<()> {
        if record.length == 0 {
            return Err(WdfError::InvalidTable("empty chunk appended".to_string()));
        }
        if record.virtual_offset < self.end() {
            return Err(WdfError::InvalidTable(format!(
                "chunk at {} appended before table end {}",
                record.virtual_offset,
                self.end()
            )));
        }

        self.records.push(record);
        self.data_size += record.length;
        Ok(())
    }

    /// Grow the last record by `length` bytes (coalescing)
    pub(crate) fn extend_last(&mut self, length: u64) {
        if let Some(last) = self.records.last_mut() {
            last.length += length;
            self.data_size += length;
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChunkRecord> {
        self.records.get(index)
    }

    pub fn last(&self) -> Option<&ChunkRecord> {
        self.records.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChunkRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    /// Sum of all record lengths
    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    /// Virtual end of the last record (0 when empty)
    pub fn end(&self) -> u64 {
        self.records.last().map(|c| c.end()).unwrap_or(0)
    }

    /// Resolve a virtual offset by binary search
    pub fn lookup(&self, virtual_offset: u64) -> Lookup {
        // First record starting after the offset
        let idx = self
            .records
            .partition_point(|c| c.virtual_offset <= virtual_offset);

        if idx > 0 && virtual_offset < self.records[idx - 1].end() {
            Lookup::Inside(idx - 1)
        } else {
            Lookup::Gap(idx)
        }
    }

    /// Check that `index` is the right answer for `virtual_offset`
    fn resolves_at(&self, index: usize, virtual_offset: u64) -> Option<Lookup> {
        if index > self.records.len() {
            return None;
        }
        if let Some(c) = self.records.get(index) {
            if c.contains(virtual_offset) {
                return Some(Lookup::Inside(index));
            }
        }

        let after_prev = index == 0 || self.records[index - 1].end() <= virtual_offset;
        let before_next = self
            .records
            .get(index)
            .map_or(true, |c| virtual_offset < c.virtual_offset);

        if after_prev && before_next {
            Some(Lookup::Gap(index))
        } else {
            None
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate a table loaded from disk against its header
    pub fn validate(&self, header: &Header) -> Result<()> {
        if self.records.len() as u64 != header.chunk_count as u64 {
            return Err(WdfError::InvalidTable(format!(
                "header announces {} chunks, table holds {}",
                header.chunk_count,
                self.records.len()
            )));
        }

        let data_start = header.data_start();
        let mut prev_end = 0u64;
        let mut total = 0u64;

        for (i, c) in self.records.iter().enumerate() {
            if c.length == 0 {
                return Err(WdfError::InvalidTable(format!("chunk {} is empty", i)));
            }
            if i > 0 && c.virtual_offset < prev_end {
                return Err(WdfError::InvalidTable(format!(
                    "chunk {} at {} overlaps or precedes previous end {}",
                    i, c.virtual_offset, prev_end
                )));
            }

            let end = c.virtual_offset.checked_add(c.length).ok_or_else(|| {
                WdfError::InvalidTable(format!("chunk {} virtual range overflows", i))
            })?;
            if end > header.virtual_size {
                return Err(WdfError::InvalidTable(format!(
                    "chunk {} ends at {} past virtual size {}",
                    i, end, header.virtual_size
                )));
            }

            let physical_end = c.physical_offset.checked_add(c.length).ok_or_else(|| {
                WdfError::InvalidTable(format!("chunk {} physical range overflows", i))
            })?;
            if c.physical_offset < data_start || physical_end > header.table_offset {
                return Err(WdfError::InvalidTable(format!(
                    "chunk {} physical range {}..{} outside data region {}..{}",
                    i, c.physical_offset, physical_end, data_start, header.table_offset
                )));
            }

            prev_end = end;
            total += c.length;
        }

        if total != header.physical_data_size {
            return Err(WdfError::InvalidTable(format!(
                "chunk lengths sum to {}, header says {}",
                total, header.physical_data_size
            )));
        }

        Ok(())
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialize all records in the layout of `format_version`
    pub fn encode(&self, format_version: u32) -> Result<Bytes> {
        let mut out =
            BytesMut::with_capacity(self.records.len() * record_size(format_version) as usize);
        for record in &self.records {
            RawChunk::for_version(*record, format_version).encode_into(&mut out)?;
        }
        Ok(out.freeze())
    }

    /// Parse `count` records of `format_version` layout.
    ///
    /// Ordering is not checked here; call [`ChunkTable::validate`].
    pub fn decode(bytes: &[u8], format_version: u32, count: u32) -> Result<Self> {
        let size = record_size(format_version) as usize;
        if bytes.len() != size * count as usize {
            return Err(WdfError::InvalidTable(format!(
                "expected {} bytes for {} records, got {}",
                size * count as usize,
                count,
                bytes.len()
            )));
        }

        let mut table = Self::with_capacity(count as usize);
        for raw in bytes.chunks_exact(size) {
            let record = RawChunk::decode(raw, format_version)?.into_record()?;
            table.data_size = table.data_size.saturating_add(record.length);
            table.records.push(record);
        }
        Ok(table)
    }

    /// CRC-32 over serialized records
    pub fn checksum(encoded: &[u8]) -> u32 {
        crc32fast::hash(encoded)
    }
}

impl std::ops::Index<usize> for ChunkTable {
    type Output = ChunkRecord;

    fn index(&self, index: usize) -> &ChunkRecord {
        &self.records[index]
    }
}

impl<'a> IntoIterator for &'a ChunkTable {
    type Item = &'a ChunkRecord;
    type IntoIter = std::slice::Iter<'a, ChunkRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// =============================================================================
// Sequential Cursor
// =============================================================================

/// Remembers the last resolved index so sequential reads skip the search
#[derive(Debug, Clone, Copy, Default)]
pub struct TableCursor {
    last: usize,
}

impl TableCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `virtual_offset`, probing the last index and its successor
    /// before falling back to binary search.
    pub fn resolve(&mut self, table: &ChunkTable, virtual_offset: u64) -> Lookup {
        for probe in [self.last, self.last + 1] {
            if let Some(hit) = table.resolves_at(probe, virtual_offset) {
                self.last = hit.index();
                return hit;
            }
        }

        let hit = table.lookup(virtual_offset);
        self.last = hit.index();
        hit
    }

    /// Forget the remembered position
    pub fn reset(&mut self) {
        self.last = 0;
    }
}
