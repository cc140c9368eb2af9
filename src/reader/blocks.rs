//! Data Block Iteration
//!
//! Walks the real-data regions of a chunk table in virtual order.

use crate::chunk::{ChunkTable, Lookup};

use super::DataBlock;

/// Next run of real bytes at or after `virtual_offset`.
///
/// With `alignment_hint > 0`, following chunks separated by a hole shorter
/// than the hint are merged into the reported block.
pub(crate) fn next_block(
    table: &ChunkTable,
    virtual_size: u64,
    virtual_offset: u64,
    alignment_hint: u64,
) -> Option<DataBlock> {
    if virtual_offset >= virtual_size {
        return None;
    }

    let (mut idx, start) = match table.lookup(virtual_offset) {
        Lookup::Inside(i) => (i, virtual_offset),
        Lookup::Gap(i) => (i, table.get(i)?.virtual_offset),
    };

    let mut end = table[idx].end();
    if alignment_hint > 0 {
        while let Some(next) = table.get(idx + 1) {
            if next.virtual_offset - end >= alignment_hint {
                break;
            }
            end = next.end();
            idx += 1;
        }
    }

    Some(DataBlock {
        offset: start,
        length: end - start,
    })
}

/// Iterator over every data block, in increasing virtual order
#[derive(Debug, Clone)]
pub struct DataBlocks<'a> {
    table: &'a ChunkTable,
    virtual_size: u64,
    position: u64,
    alignment_hint: u64,
}

impl<'a> DataBlocks<'a> {
    pub(crate) fn new(table: &'a ChunkTable, virtual_size: u64, alignment_hint: u64) -> Self {
        Self {
            table,
            virtual_size,
            position: 0,
            alignment_hint,
        }
    }
}

impl<'a> Iterator for DataBlocks<'a> {
    type Item = DataBlock;

    fn next(&mut self) -> Option<DataBlock> {
        let block = next_block(
            self.table,
            self.virtual_size,
            self.position,
            self.alignment_hint,
        )?;
        self.position = block.end();
        Some(block)
    }
}
