//! Container Probe
//!
//! Classifies a file by its leading bytes before any engine is opened, so a
//! caller can route CISO and WBFS images to their own readers.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;
use crate::header::MAGIC;

/// Magic of a compact ISO container
pub const CISO_MAGIC: &[u8; 4] = b"CISO";

/// Magic of a native WBFS partition/file
pub const WBFS_MAGIC: &[u8; 4] = b"WBFS";

/// Bytes needed to tell all known containers apart
pub const PROBE_SIZE: usize = 8;

/// Container kinds recognized at the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Handled by this crate
    Wdf,
    /// Peer format, not read here
    Ciso,
    /// Peer format, not read here
    Wbfs,
    /// Plain image or something else entirely
    Unknown,
}

impl ContainerKind {
    pub fn name(&self) -> &'static str {
        match self {
            ContainerKind::Wdf => "WDF",
            ContainerKind::Ciso => "CISO",
            ContainerKind::Wbfs => "WBFS",
            ContainerKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify leading bytes
pub fn probe(bytes: &[u8]) -> ContainerKind {
    if bytes.starts_with(MAGIC) {
        ContainerKind::Wdf
    } else if bytes.starts_with(CISO_MAGIC) {
        ContainerKind::Ciso
    } else if bytes.starts_with(WBFS_MAGIC) {
        ContainerKind::Wbfs
    } else {
        ContainerKind::Unknown
    }
}

/// Classify a file by its first [`PROBE_SIZE`] bytes
pub fn probe_file(path: &Path) -> Result<ContainerKind> {
    let mut head = Vec::with_capacity(PROBE_SIZE);
    File::open(path)?
        .take(PROBE_SIZE as u64)
        .read_to_end(&mut head)?;
    Ok(probe(&head))
}
