//! Configuration for wdfkit
//!
//! Explicit per-session write options with sensible defaults.

use crate::error::{Result, WdfError};
use crate::header::{self, CURRENT_VERSION, MAX_SUPPORTED_VERSION};

/// Options passed to a write session at open time
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Format Configuration
    // -------------------------------------------------------------------------
    /// Header/record generation to write (1, 2 or 3)
    pub format_version: u32,

    /// Physical alignment for every new chunk (0 = unaligned, else a power of two)
    pub align_factor: u32,

    // -------------------------------------------------------------------------
    // Write Engine Configuration
    // -------------------------------------------------------------------------
    /// Minimum zero run that `write_sparse` turns into a hole.
    /// `None` derives it from the record size of `format_version`.
    pub min_hole_size: Option<u64>,

    /// fsync the file after the final header rewrite (file-backed writers only)
    pub sync_on_close: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format_version: CURRENT_VERSION,
            align_factor: 0,
            min_hole_size: None,
            sync_on_close: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check option combinations before a session is opened
    pub fn validate(&self) -> Result<()> {
        if self.format_version == 0 || self.format_version > MAX_SUPPORTED_VERSION {
            return Err(WdfError::Config(format!(
                "unsupported format version {} (expected 1..={})",
                self.format_version, MAX_SUPPORTED_VERSION
            )));
        }

        if self.align_factor != 0 && !self.align_factor.is_power_of_two() {
            return Err(WdfError::Config(format!(
                "align factor {} is not a power of two",
                self.align_factor
            )));
        }

        if self.format_version == 1 && self.align_factor != 0 {
            return Err(WdfError::Config(
                "v1 containers cannot record an align factor".to_string(),
            ));
        }

        if self.min_hole_size == Some(0) {
            return Err(WdfError::Config("min hole size must be > 0".to_string()));
        }

        Ok(())
    }

    /// Effective hole-elision threshold for this configuration
    pub fn effective_min_hole_size(&self) -> u64 {
        self.min_hole_size
            .unwrap_or_else(|| header::min_hole_size(self.format_version))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the generation to write
    pub fn format_version(mut self, version: u32) -> Self {
        self.config.format_version = version;
        self
    }

    /// Set the physical chunk alignment (0 disables alignment)
    pub fn align_factor(mut self, align: u32) -> Self {
        self.config.align_factor = align;
        self
    }

    /// Override the derived hole threshold
    pub fn min_hole_size(mut self, size: u64) -> Self {
        self.config.min_hole_size = Some(size);
        self
    }

    /// Enable or disable the fsync on close
    pub fn sync_on_close(mut self, sync: bool) -> Self {
        self.config.sync_on_close = sync;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
