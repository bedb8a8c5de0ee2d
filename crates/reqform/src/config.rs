//! Parser configuration.
//!
//! Limits default to permissive values; deployments facing untrusted
//! clients should lower `max_body_bytes` in particular. The configuration
//! is plain data and serializes with serde so it can be loaded from
//! application config files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default spill-to-disk threshold per upload part (256 KiB).
pub const DEFAULT_MAX_BRIGADE_BYTES: u64 = 256 * 1024;

/// Default read block size hint for environment adapters (64 KiB).
pub const DEFAULT_READ_BLOCK_SIZE: u32 = 64 * 1024;

/// Default cap on entries in a single parser's table.
pub const DEFAULT_MAX_PARAMS: u32 = 4096;

/// Default cap on headers per multipart part.
pub const DEFAULT_MAX_HEADERS: u32 = 64;

/// Default multipart nesting ceiling.
pub const DEFAULT_MAX_NESTING: u8 = 8;

/// Limits and environment settings shared by all parsers of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Total bytes fed to the body parser before `OverLimit`.
    max_body_bytes: u64,
    /// Per-part spill-to-disk threshold.
    max_brigade_bytes: u64,
    /// Reject any part carrying a filename.
    disable_uploads: bool,
    /// Directory for upload spill files; system temp dir when unset.
    temp_dir: Option<PathBuf>,
    /// Read size hint for the environment adapter.
    read_block_size: u32,
    /// Cap on entries in a single parser's table.
    max_params: u32,
    /// Cap on headers per multipart part.
    max_headers: u32,
    /// Multipart nesting depth ceiling.
    max_nesting: u8,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: u64::MAX,
            max_brigade_bytes: DEFAULT_MAX_BRIGADE_BYTES,
            disable_uploads: false,
            temp_dir: None,
            read_block_size: DEFAULT_READ_BLOCK_SIZE,
            max_params: DEFAULT_MAX_PARAMS,
            max_headers: DEFAULT_MAX_HEADERS,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

impl ParserConfig {
    /// Create a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total body byte ceiling.
    #[must_use]
    pub fn with_max_body_bytes(mut self, bytes: u64) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Set the per-part spill threshold.
    #[must_use]
    pub fn with_max_brigade_bytes(mut self, bytes: u64) -> Self {
        self.max_brigade_bytes = bytes;
        self
    }

    /// Enable or disable file uploads.
    #[must_use]
    pub fn with_disable_uploads(mut self, disable: bool) -> Self {
        self.disable_uploads = disable;
        self
    }

    /// Set the spill file directory.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Set the adapter read block size hint.
    #[must_use]
    pub fn with_read_block_size(mut self, bytes: u32) -> Self {
        self.read_block_size = bytes;
        self
    }

    /// Set the table entry cap.
    #[must_use]
    pub fn with_max_params(mut self, count: u32) -> Self {
        self.max_params = count;
        self
    }

    /// Set the per-part header cap.
    #[must_use]
    pub fn with_max_headers(mut self, count: u32) -> Self {
        self.max_headers = count;
        self
    }

    /// Set the multipart nesting ceiling.
    #[must_use]
    pub fn with_max_nesting(mut self, depth: u8) -> Self {
        self.max_nesting = depth;
        self
    }

    /// Total body byte ceiling.
    #[must_use]
    pub fn max_body_bytes(&self) -> u64 {
        self.max_body_bytes
    }

    /// Per-part spill threshold.
    #[must_use]
    pub fn max_brigade_bytes(&self) -> u64 {
        self.max_brigade_bytes
    }

    /// True when file uploads are rejected.
    #[must_use]
    pub fn disable_uploads(&self) -> bool {
        self.disable_uploads
    }

    /// Spill file directory, when configured.
    #[must_use]
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    /// Adapter read block size hint.
    #[must_use]
    pub fn read_block_size(&self) -> u32 {
        self.read_block_size
    }

    /// Table entry cap.
    #[must_use]
    pub fn max_params(&self) -> u32 {
        self.max_params
    }

    /// Per-part header cap.
    #[must_use]
    pub fn max_headers(&self) -> u32 {
        self.max_headers
    }

    /// Multipart nesting ceiling.
    #[must_use]
    pub fn max_nesting(&self) -> u8 {
        self.max_nesting
    }
}
