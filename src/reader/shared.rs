//! Shared Reader
//!
//! A session is single-owner. Callers that need one open container across
//! threads wrap it here: every read takes the lock for its whole duration.
//! Block queries only touch the immutable chunk table and skip the lock.

use std::io::{Read, Seek};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::chunk::ChunkTable;
use crate::error::Result;
use crate::header::Header;

use super::blocks::{next_block, DataBlocks};
use super::{DataBlock, WdfReader};

/// Thread-shareable handle around a [`WdfReader`]
pub struct SharedReader<R: Read + Seek> {
    reader: Mutex<WdfReader<R>>,
    /// Immutable copy so metadata queries skip the lock
    header: Header,
    table: Arc<ChunkTable>,
}

impl<R: Read + Seek> SharedReader<R> {
    pub fn new(reader: WdfReader<R>) -> Self {
        Self {
            header: reader.header().clone(),
            table: reader.table_handle(),
            reader: Mutex::new(reader),
        }
    }

    /// Fill `buf` from `virtual_offset` under the session lock
    pub fn read_at(&self, virtual_offset: u64, buf: &mut [u8]) -> Result<()> {
        self.reader.lock().read_at(virtual_offset, buf)
    }

    pub fn read(&self, virtual_offset: u64, length: u64) -> Result<Vec<u8>> {
        self.reader.lock().read(virtual_offset, length)
    }

    pub fn next_data_block(&self, virtual_offset: u64, alignment_hint: u64) -> Option<DataBlock> {
        next_block(
            &self.table,
            self.header.virtual_size,
            virtual_offset,
            alignment_hint,
        )
    }

    pub fn blocks(&self, alignment_hint: u64) -> DataBlocks<'_> {
        DataBlocks::new(&self.table, self.header.virtual_size, alignment_hint)
    }

    pub fn table(&self) -> &ChunkTable {
        &self.table
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn virtual_size(&self) -> u64 {
        self.header.virtual_size
    }

    pub fn into_inner(self) -> WdfReader<R> {
        self.reader.into_inner()
    }
}
