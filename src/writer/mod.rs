//! Write Engine Module
//!
//! Single-pass, append-only writer for WDF containers.
//!
//! ## Responsibilities
//! - Store literal bytes and grow the chunk table (coalescing neighbours)
//! - Elide zero runs as holes when that is cheaper than storing them
//! - Align chunk starts to the configured factor
//! - Write the chunk table and commit the header on close
//!
//! ## Session Lifecycle
//! ```text
//!   create/new ──► Opened ──write_*──► Writing ──close──► (consumed)
//!                     │                   │
//!                     └──── error ────────┴──► Poisoned (close refused)
//! ```
//!
//! `close` consumes the writer, so no operation can follow it.
//! A provisional header is written at open. Only `close` rewrites it with the
//! final sizes, so a writer that is dropped early leaves a file that readers
//! reject as incomplete.

mod engine;
mod scan;

pub use engine::WdfWriter;
pub use scan::{is_zero, zero_run_len, DataSpans};

/// Write session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Provisional header written, nothing else yet
    Opened,
    /// At least one write operation accepted
    Writing,
    /// A write failed; the session can no longer be finalized
    Poisoned,
}

/// What a successful close produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// Reconstructed stream length
    pub virtual_size: u64,
    /// Bytes stored in chunks (excludes padding, header, table)
    pub physical_data_size: u64,
    /// Number of chunk records
    pub chunk_count: u32,
    /// Offset of the trailing magic + table
    pub table_offset: u64,
    /// Total container length
    pub file_size: u64,
}
