//! # wdfkit
//!
//! A sparse, chunked container ("WDF") for optical-disc images with:
//! - Hole elision: zero runs are not stored, only recorded by omission
//! - Single-pass append-only writing with a committed header on close
//! - Random-access reading with the chunk table resident in memory
//! - Three header generations behind a compatible-version gate
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Caller (pack / unpack / verify)              │
//! └─────────────┬───────────────────────────────┬───────────────┘
//!               │                               │
//!               ▼                               ▼
//!       ┌───────────────┐               ┌───────────────┐
//!       │  Write Engine │               │  Read Engine  │
//!       │ literal/sparse│               │ read / blocks │
//!       │     /zero     │               │               │
//!       └───────┬───────┘               └───────┬───────┘
//!               │                               │
//!               ▼                               ▼
//!       ┌─────────────────────────────────────────────────┐
//!       │      Chunk Table  (virtual → physical runs)      │
//!       └───────────────────────┬─────────────────────────┘
//!                               │
//!                               ▼
//!       ┌─────────────────────────────────────────────────┐
//!       │  Header Codec   [header][data...][magic][table]  │
//!       └─────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod header;
pub mod chunk;
pub mod writer;
pub mod reader;
pub mod probe;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, WdfError};
pub use config::Config;
pub use header::Header;
pub use chunk::{ChunkRecord, ChunkTable};
pub use writer::{WdfWriter, WriteSummary};
pub use reader::{DataBlock, SharedReader, WdfReader};
pub use probe::{probe, ContainerKind};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of wdfkit
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
