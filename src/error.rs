//! Error types for rzim.
//!
//! Errors fall into two classes: I/O failures from the underlying range
//! source, which a caller may retry, and format failures, which mean the
//! archive is corrupt or uses a variant this reader does not support.
//! Absent entries are never errors; lookups return `Option` instead.

use std::sync::Arc;

use thiserror::Error;

/// Result type alias using [`ZimError`]
pub type Result<T> = std::result::Result<T, ZimError>;

/// Unified error type for archive operations
#[derive(Debug, Error)]
pub enum ZimError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Read of {length} bytes at offset {offset} is past the end ({total} bytes)")]
    OutOfRange { offset: u64, length: u64, total: u64 },

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Malformed archive: {0}")]
    Format(String),

    #[error("Invalid magic number {0:#010x}")]
    InvalidMagic(u32),

    #[error("Unsupported archive version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("Unknown cluster compression {0}")]
    UnknownCompression(u8),

    #[error("Decompression failed: {0}")]
    Decompress(String),

    #[error("Mimetype index {index} out of range ({count} mimetypes)")]
    MimeIndexOutOfRange { index: u16, count: usize },

    #[error("Blob {blob} out of range in cluster {cluster} ({count} blobs)")]
    BlobOutOfRange { cluster: u32, blob: u32, count: u32 },

    #[error("Entry index {index} out of range ({count} entries)")]
    EntryOutOfRange { index: u32, count: u32 },

    #[error("Redirect cycle or excessive chain length starting at entry {0}")]
    RedirectLimit(u32),

    #[error("No eligible entry in namespace '{0}'")]
    NoEligibleEntry(char),

    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    // -------------------------------------------------------------------------
    // Coalesced Errors
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Shared(#[from] Arc<ZimError>),
}

impl ZimError {
    /// Whether this error came from the byte source rather than the archive
    /// contents. I/O errors may succeed on retry; format errors will not.
    pub fn is_io(&self) -> bool {
        match self {
            ZimError::Io(_) | ZimError::Http(_) | ZimError::OutOfRange { .. } => true,
            ZimError::Shared(inner) => inner.is_io(),
            _ => false,
        }
    }

    /// Whether this error indicates corruption or an unsupported variant.
    pub fn is_format(&self) -> bool {
        !self.is_io()
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        ZimError::Format(msg.into())
    }
}
