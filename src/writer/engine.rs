//! WDF Writer
//!
//! Appends literal data, holes and finally the chunk table to a stream.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::chunk::{ChunkRecord, ChunkTable};
use crate::config::Config;
use crate::error::{Result, WdfError};
use crate::header::{Header, MAGIC, MAGIC_SIZE};

use super::scan::DataSpans;
use super::{WriteSummary, WriterState};

/// Source of alignment padding
const ZEROS: [u8; 4096] = [0u8; 4096];

/// Hook run after the header commit (fsync for file-backed writers)
type SyncHook<W> = fn(&mut W) -> io::Result<()>;

/// Writes a WDF container in one sequential pass
pub struct WdfWriter<W: Write + Seek> {
    /// Physical stream
    inner: W,
    /// Provisional header, finalized on close
    header: Header,
    /// Chunks written so far
    table: ChunkTable,
    state: WriterState,
    /// End of the last write in virtual space
    virtual_cursor: u64,
    /// Next physical byte to write
    physical_cursor: u64,
    /// Virtual size requested via `set_virtual_size`
    declared_size: u64,
    /// Zero runs at least this long become holes
    min_hole_size: u64,
    sync_hook: Option<SyncHook<W>>,
}

impl WdfWriter<BufWriter<File>> {
    /// Create (or truncate) a container file
    pub fn create(path: &Path, config: &Config) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = Self::new(BufWriter::new(file), config)?;
        if config.sync_on_close {
            writer.sync_hook = Some(sync_file);
        }

        debug!(path = %path.display(), "created WDF container");
        Ok(writer)
    }
}

fn sync_file(writer: &mut BufWriter<File>) -> io::Result<()> {
    writer.flush()?;
    writer.get_ref().sync_all()
}

impl<W: Write + Seek> WdfWriter<W> {
    /// Start a session on any seekable stream
    ///
    /// The stream must be empty: the table has to be the last thing in the
    /// container and nothing here truncates. Writes the provisional header at
    /// offset 0 immediately.
    pub fn new(mut inner: W, config: &Config) -> Result<Self> {
        config.validate()?;

        let existing = inner.seek(SeekFrom::End(0))?;
        if existing != 0 {
            return Err(WdfError::InvalidState(format!(
                "output stream already holds {} bytes",
                existing
            )));
        }

        let header = Header::new(config.format_version, config.align_factor);
        inner.seek(SeekFrom::Start(0))?;
        inner.write_all(&header.encode()?)?;

        debug!(
            format_version = header.format_version,
            align_factor = header.align_factor,
            min_hole_size = config.effective_min_hole_size(),
            "opened WDF write session"
        );

        Ok(Self {
            inner,
            physical_cursor: header.data_start(),
            header,
            table: ChunkTable::new(),
            state: WriterState::Opened,
            virtual_cursor: 0,
            declared_size: 0,
            min_hole_size: config.effective_min_hole_size(),
            sync_hook: None,
        })
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Store `data` verbatim at `virtual_offset`
    pub fn write_literal(&mut self, virtual_offset: u64, data: &[u8]) -> Result<()> {
        self.begin(virtual_offset)?;
        let result = self.append_literal(virtual_offset, data);
        self.finish_op(result, virtual_offset, data.len() as u64)
    }

    /// Store `data` at `virtual_offset`, eliding long zero runs as holes
    pub fn write_sparse(&mut self, virtual_offset: u64, data: &[u8]) -> Result<()> {
        self.begin(virtual_offset)?;

        let mut result = Ok(());
        for span in DataSpans::new(data, self.min_hole_size) {
            result = self.append_literal(virtual_offset + span.start as u64, &data[span]);
            if result.is_err() {
                break;
            }
        }

        self.finish_op(result, virtual_offset, data.len() as u64)
    }

    /// Record `length` zero bytes at `virtual_offset` as a hole
    pub fn write_zero(&mut self, virtual_offset: u64, length: u64) -> Result<()> {
        self.begin(virtual_offset)?;
        trace!(virtual_offset, length, "hole");
        self.finish_op(Ok(()), virtual_offset, length)
    }

    /// Declare the final virtual size; anything past the last write is a hole
    pub fn set_virtual_size(&mut self, size: u64) -> Result<()> {
        self.ensure_writable()?;
        if size < self.virtual_cursor {
            return Err(WdfError::OutOfOrder {
                offset: size,
                cursor: self.virtual_cursor,
            });
        }
        self.declared_size = size;
        Ok(())
    }

    /// Flush the table, commit the header and end the session
    pub fn close(self) -> Result<WriteSummary> {
        self.finish().map(|(_, summary)| summary)
    }

    /// Like [`WdfWriter::close`], also handing back the physical stream
    pub fn finish(mut self) -> Result<(W, WriteSummary)> {
        self.ensure_writable()?;
        let summary = self.commit()?;
        Ok((self.inner, summary))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn virtual_cursor(&self) -> u64 {
        self.virtual_cursor
    }

    pub fn physical_cursor(&self) -> u64 {
        self.physical_cursor
    }

    pub fn chunk_count(&self) -> usize {
        self.table.len()
    }

    pub fn table(&self) -> &ChunkTable {
        &self.table
    }

    pub fn min_hole_size(&self) -> u64 {
        self.min_hole_size
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_writable(&self) -> Result<()> {
        match self.state {
            WriterState::Opened | WriterState::Writing => Ok(()),
            WriterState::Poisoned => Err(WdfError::InvalidState(
                "write session failed earlier and cannot continue".to_string(),
            )),
        }
    }

    /// Common entry checks: session usable and offsets non-decreasing
    fn begin(&mut self, virtual_offset: u64) -> Result<()> {
        self.ensure_writable()?;
        if virtual_offset < self.virtual_cursor {
            self.state = WriterState::Poisoned;
            return Err(WdfError::OutOfOrder {
                offset: virtual_offset,
                cursor: self.virtual_cursor,
            });
        }
        Ok(())
    }

    /// Advance the virtual cursor on success, poison the session on failure
    fn finish_op(&mut self, result: Result<()>, virtual_offset: u64, length: u64) -> Result<()> {
        let end = result.and_then(|_| {
            virtual_offset.checked_add(length).ok_or_else(|| {
                WdfError::InvalidState("virtual offset overflows u64".to_string())
            })
        });

        match end {
            Ok(end) => {
                self.virtual_cursor = end;
                self.state = WriterState::Writing;
                Ok(())
            }
            Err(e) => {
                self.state = WriterState::Poisoned;
                Err(e)
            }
        }
    }

    /// Write one literal span and record it
    fn append_literal(&mut self, virtual_offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let length = data.len() as u64;

        let coalesce = self.table.last().map_or(false, |last| {
            last.end() == virtual_offset && last.physical_end() == self.physical_cursor
        });

        if !coalesce {
            let padding = self.padding_needed();
            self.write_padding(padding)?;
        }

        self.inner.write_all(data)?;

        if coalesce {
            self.table.extend_last(length);
        } else {
            self.table
                .append(ChunkRecord::new(virtual_offset, self.physical_cursor, length))?;
            trace!(
                virtual_offset,
                physical_offset = self.physical_cursor,
                length,
                "new chunk"
            );
        }

        self.physical_cursor += length;
        Ok(())
    }

    fn padding_needed(&self) -> u64 {
        let align = self.header.align_factor as u64;
        if align == 0 {
            return 0;
        }
        (align - self.physical_cursor % align) % align
    }

    fn write_padding(&mut self, mut padding: u64) -> Result<()> {
        while padding > 0 {
            let n = padding.min(ZEROS.len() as u64) as usize;
            self.inner.write_all(&ZEROS[..n])?;
            self.physical_cursor += n as u64;
            padding -= n as u64;
        }
        Ok(())
    }

    /// Append magic + table, then rewrite the header in place
    fn commit(&mut self) -> Result<WriteSummary> {
        let chunk_count = u32::try_from(self.table.len()).map_err(|_| {
            WdfError::InvalidTable(format!("{} chunks exceed the format limit", self.table.len()))
        })?;

        let padding = self.padding_needed();
        self.write_padding(padding)?;

        let table_offset = self.physical_cursor;
        let encoded = self.table.encode(self.header.format_version)?;

        self.header.virtual_size = self.virtual_cursor.max(self.declared_size);
        self.header.physical_data_size = self.table.data_size();
        self.header.chunk_count = chunk_count;
        self.header.table_offset = table_offset;
        if self.header.format_version >= 3 {
            self.header.table_crc = ChunkTable::checksum(&encoded);
            self.header.finalized = true;
        }

        self.inner.write_all(MAGIC)?;
        self.inner.write_all(&encoded)?;
        self.inner.flush()?;

        // The only backward seek of the session: a bounded header rewrite
        let header_bytes = self.header.encode()?;
        self.inner.seek(SeekFrom::Start(0))?;
        self.inner.write_all(&header_bytes)?;
        self.inner.flush()?;

        if let Some(sync) = self.sync_hook {
            sync(&mut self.inner)?;
        }

        let summary = WriteSummary {
            virtual_size: self.header.virtual_size,
            physical_data_size: self.header.physical_data_size,
            chunk_count,
            table_offset,
            file_size: table_offset + MAGIC_SIZE + encoded.len() as u64,
        };

        debug!(
            virtual_size = summary.virtual_size,
            physical_data_size = summary.physical_data_size,
            chunk_count = summary.chunk_count,
            table_offset = summary.table_offset,
            "closed WDF write session"
        );

        Ok(summary)
    }
}

// =============================================================================
// Sequential Stream Adapter
// =============================================================================

/// Sparse writes at the virtual cursor, so `io::copy` can fill a container
impl<W: Write + Seek> Write for WdfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let offset = self.virtual_cursor;
        self.write_sparse(offset, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
