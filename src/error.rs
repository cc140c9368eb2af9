//! Error types for wdfkit
//!
//! Provides a unified error type for all container operations.

use thiserror::Error;

/// Result type alias using WdfError
pub type Result<T> = std::result::Result<T, WdfError>;

/// Unified error type for WDF operations
#[derive(Debug, Error)]
pub enum WdfError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Header Errors
    // -------------------------------------------------------------------------
    /// The leading signature is not a WDF magic. Callers may try a peer format.
    #[error("Invalid WDF magic: {0:02x?}")]
    InvalidMagic([u8; 8]),

    #[error("Incompatible WDF version: file needs v{compatible}, engine supports up to v{supported}")]
    IncompatibleVersion { compatible: u32, supported: u32 },

    #[error("Invalid WDF header: {0}")]
    InvalidHeader(String),

    #[error("Split WDF containers are not supported ({parts} parts)")]
    SplitContainer { parts: u32 },

    /// Provisional header without a committed chunk table (abandoned writer).
    #[error("WDF container is incomplete: header was never finalized")]
    Incomplete,

    // -------------------------------------------------------------------------
    // Chunk Table Errors
    // -------------------------------------------------------------------------
    #[error("Invalid chunk table: {0}")]
    InvalidTable(String),

    // -------------------------------------------------------------------------
    // Access Errors
    // -------------------------------------------------------------------------
    #[error("Read out of range: offset={offset} len={len} virtual_size={virtual_size}")]
    OutOfRange {
        offset: u64,
        len: u64,
        virtual_size: u64,
    },

    #[error("Out-of-order write: offset {offset} is before virtual cursor {cursor}")]
    OutOfOrder { offset: u64, cursor: u64 },

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    // -------------------------------------------------------------------------
    // Verification Errors
    // -------------------------------------------------------------------------
    /// Virtual stream differs from the image it was compared against
    #[error("Content mismatch: {0}")]
    Mismatch(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WdfError {
    /// True when the input simply is not a WDF container (recoverable: the
    /// caller should try CISO, WBFS or a plain image reader instead).
    pub fn is_not_this_format(&self) -> bool {
        matches!(self, WdfError::InvalidMagic(_))
    }
}

impl From<bincode::Error> for WdfError {
    fn from(e: bincode::Error) -> Self {
        match *e {
            bincode::ErrorKind::Io(io) => WdfError::Io(io),
            other => WdfError::Serialization(other.to_string()),
        }
    }
}

impl From<WdfError> for std::io::Error {
    fn from(e: WdfError) -> Self {
        match e {
            WdfError::Io(io) => io,
            WdfError::OutOfRange { .. } => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, e)
            }
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}
