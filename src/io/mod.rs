//! Range-readable byte sources.
//!
//! An archive never sees a filesystem; it only needs something that can
//! report its length and hand back an arbitrary byte range. Local files,
//! HTTP servers with Range support and in-memory buffers all qualify, and
//! [`MultiPartReader`] stitches several of them into one logical stream.

mod http;
mod local;
mod memory;
mod multipart;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;
pub use memory::MemoryReader;
pub use multipart::MultiPartReader;

use async_trait::async_trait;

use crate::error::{Result, ZimError};

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill the whole buffer starting at `offset`.
    ///
    /// Requests reaching past [`size`](ReadAt::size) fail with
    /// [`ZimError::OutOfRange`] before any read is issued.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let length = buf.len() as u64;
        let total = self.size();
        if offset.checked_add(length).is_none_or(|end| end > total) {
            return Err(ZimError::OutOfRange {
                offset,
                length,
                total,
            });
        }

        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .read_at(offset + filled as u64, &mut buf[filled..])
                .await?;
            if n == 0 {
                return Err(ZimError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("short read at offset {}", offset + filled as u64),
                )));
            }
            filled += n;
        }
        Ok(())
    }

    /// Read `length` bytes at `offset` into a fresh buffer.
    async fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.read_exact_at(offset, &mut buf).await?;
        Ok(buf)
    }
}

