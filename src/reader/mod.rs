//! Read Engine Module
//!
//! Random access to the virtual stream of a committed WDF container.
//!
//! ## Responsibilities
//! - Load and validate header + chunk table once at open
//! - Resolve virtual ranges into physical copies and zero fills
//! - Report real-data blocks so callers can skip holes entirely
//!
//! ## Range Resolution
//! ```text
//! virtual:  |--gap--|==chunk 0==|----gap----|==chunk 1==|--gap--|
//!                         ▲                      ▲
//!                copy from physical       copy from physical
//!           zero fill          zero fill               zero fill
//! ```

mod blocks;
mod engine;
mod shared;

pub use blocks::DataBlocks;
pub use engine::WdfReader;
pub use shared::SharedReader;

/// A contiguous run of real (stored) bytes in virtual space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlock {
    /// Virtual start
    pub offset: u64,
    /// Length in bytes (may include merged short holes)
    pub length: u64,
}

impl DataBlock {
    /// Virtual end (exclusive)
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}
