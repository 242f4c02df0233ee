//! Presents several physical parts as one contiguous byte stream.
//!
//! Large archives are often distributed split into fixed-size pieces
//! (`.zimaa`, `.zimab`, ...). Each piece is its own [`ReadAt`] source; the
//! reader keeps a prefix-sum table of part boundaries so that a global
//! offset maps to its part in O(log n).

use std::sync::Arc;

use async_trait::async_trait;

use super::ReadAt;
use crate::error::{Result, ZimError};

/// Start and end (exclusive) of one part in the logical stream.
#[derive(Debug, Clone, Copy)]
struct PartSpan {
    start: u64,
    end: u64,
}

/// Logical concatenation of ordered range-readable parts
pub struct MultiPartReader {
    parts: Vec<Arc<dyn ReadAt>>,
    spans: Vec<PartSpan>,
    size: u64,
}

impl MultiPartReader {
    pub fn new(parts: Vec<Arc<dyn ReadAt>>) -> Self {
        let mut spans = Vec::with_capacity(parts.len());
        let mut offset = 0u64;
        for part in &parts {
            let end = offset + part.size();
            spans.push(PartSpan { start: offset, end });
            offset = end;
        }

        tracing::trace!("Multi-part reader over {} parts, {} bytes", parts.len(), offset);

        Self {
            parts,
            spans,
            size: offset,
        }
    }

    /// Number of physical parts.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Index of the part containing `offset`, skipping empty parts.
    fn find_part_index(&self, offset: u64) -> Option<usize> {
        if offset >= self.size {
            return None;
        }
        let idx = self.spans.partition_point(|span| span.end <= offset);
        (idx < self.spans.len()).then_some(idx)
    }
}

#[async_trait]
impl ReadAt for MultiPartReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let Some(mut idx) = self.find_part_index(offset) else {
            return Ok(0);
        };

        // Parts are visited strictly in order; each sub-read completes before
        // the next part is touched.
        let mut filled = 0usize;
        while filled < buf.len() && idx < self.parts.len() {
            let span = self.spans[idx];
            let global = offset + filled as u64;
            let local = global - span.start;
            let want = ((span.end - global) as usize).min(buf.len() - filled);

            if want > 0 {
                self.parts[idx]
                    .read_exact_at(local, &mut buf[filled..filled + want])
                    .await?;
                filled += want;
            }
            idx += 1;
        }

        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let length = buf.len() as u64;
        if offset.checked_add(length).is_none_or(|end| end > self.size) {
            return Err(ZimError::OutOfRange {
                offset,
                length,
                total: self.size,
            });
        }
        let n = self.read_at(offset, buf).await?;
        if n != buf.len() {
            return Err(ZimError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("short multi-part read at offset {}", offset),
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    fn split(data: &[u8], sizes: &[usize]) -> MultiPartReader {
        let mut parts: Vec<Arc<dyn ReadAt>> = Vec::new();
        let mut pos = 0;
        for &size in sizes {
            parts.push(Arc::new(MemoryReader::new(data[pos..pos + size].to_vec())));
            pos += size;
        }
        assert_eq!(pos, data.len());
        MultiPartReader::new(parts)
    }

    #[tokio::test]
    async fn test_read_within_one_part() {
        let data: Vec<u8> = (0..30).collect();
        let reader = split(&data, &[10, 10, 10]);
        assert_eq!(reader.size(), 30);
        assert_eq!(reader.part_count(), 3);
        assert_eq!(reader.read_range(12, 5).await.unwrap(), &data[12..17]);
    }

    #[tokio::test]
    async fn test_read_spanning_parts() {
        let data: Vec<u8> = (0..30).collect();
        let reader = split(&data, &[7, 11, 12]);
        assert_eq!(reader.read_range(5, 20).await.unwrap(), &data[5..25]);
        assert_eq!(reader.read_range(0, 30).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_boundary_offsets_and_empty_parts() {
        let data: Vec<u8> = (0..20).collect();
        let reader = split(&data, &[10, 0, 0, 10]);
        assert_eq!(reader.read_range(10, 1).await.unwrap(), vec![10]);
        assert_eq!(reader.read_range(9, 2).await.unwrap(), vec![9, 10]);
        assert_eq!(reader.read_range(19, 1).await.unwrap(), vec![19]);
    }

    #[tokio::test]
    async fn test_reject_past_end() {
        let data: Vec<u8> = (0..20).collect();
        let reader = split(&data, &[10, 10]);
        let err = reader.read_range(15, 6).await.unwrap_err();
        assert!(matches!(err, ZimError::OutOfRange { total: 20, .. }));
        assert!(err.is_io());
        assert!(reader.read_range(20, 0).await.unwrap().is_empty());
    }
}
