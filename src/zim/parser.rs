//! Low-level archive parser.
//!
//! This module handles the binary parsing of the header, the three pointer
//! lists and directory entries, reading from any source that implements the
//! [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! Only the header and the mimetype list are read eagerly. Pointer lists are
//! fixed-width arrays, so element `i` is fetched with a single small range
//! read at `list_pos + i * width`; nothing is ever materialized in full.
//! Directory entries are variable length: a window is read at the entry's
//! offset and widened until the record fits.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, ZimError};
use crate::io::ReadAt;

use super::structures::*;

/// Upper bound on the mimetype list read at open time.
const MAX_MIME_LIST_SIZE: u64 = 1024 * 1024;

/// Width of a URL pointer (byte offset)
const URL_PTR_WIDTH: u64 = 8;
/// Width of a title pointer (index into URL order)
const TITLE_PTR_WIDTH: u64 = 4;
/// Width of a cluster pointer (byte offset)
const CLUSTER_PTR_WIDTH: u64 = 8;

/// Low-level archive parser.
///
/// Owns the parsed header and mimetype table, and offers O(1) access to
/// pointer list elements and entry decoding at arbitrary offsets.
///
/// ## Usage
///
/// Typically used through [`Archive`](super::Archive) rather than directly.
pub struct ZimParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
    header: Header,
    mime_types: Vec<Arc<str>>,
}

impl<R: ReadAt> ZimParser<R> {
    /// Parse the header and mimetype list of the archive behind `reader`.
    ///
    /// # Errors
    ///
    /// Fails with a format error on bad magic, an unsupported version or
    /// structure positions pointing outside the archive.
    pub async fn open(reader: Arc<R>) -> Result<Self> {
        let size = reader.size();
        if size < Header::SIZE as u64 {
            return Err(ZimError::format(format!(
                "archive is {} bytes, smaller than its header",
                size
            )));
        }

        let buf = reader.read_range(0, Header::SIZE).await?;
        let header = Header::from_bytes(&buf)?;
        validate_layout(&header, size)?;

        let mime_types = read_mime_list(reader.as_ref(), &header, size).await?;

        tracing::debug!(
            "Archive v{}.{}: {} entries, {} clusters, {} mimetypes",
            header.major_version,
            header.minor_version,
            header.entry_count,
            header.cluster_count,
            mime_types.len()
        );

        Ok(Self {
            reader,
            size,
            header,
            mime_types,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn mime_types(&self) -> &[Arc<str>] {
        &self.mime_types
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn entry_count(&self) -> u32 {
        self.header.entry_count
    }

    pub fn cluster_count(&self) -> u32 {
        self.header.cluster_count
    }

    /// Byte offset of the `index`-th entry in URL order.
    pub async fn url_pointer(&self, index: u32) -> Result<u64> {
        self.check_entry_index(index)?;
        let pos = self.header.url_ptr_pos + index as u64 * URL_PTR_WIDTH;
        let buf = self.reader.read_range(pos, URL_PTR_WIDTH as usize).await?;
        Ok(LittleEndian::read_u64(&buf))
    }

    /// URL-order index of the `index`-th entry in title order.
    pub async fn title_pointer(&self, index: u32) -> Result<u32> {
        self.check_entry_index(index)?;
        let pos = self.header.title_ptr_pos + index as u64 * TITLE_PTR_WIDTH;
        let buf = self.reader.read_range(pos, TITLE_PTR_WIDTH as usize).await?;
        let url_index = LittleEndian::read_u32(&buf);
        self.check_entry_index(url_index)?;
        Ok(url_index)
    }

    /// Byte offset of cluster `cluster`.
    ///
    /// `cluster == cluster_count` yields the end of cluster data: the
    /// checksum position, or the archive end when there is no checksum.
    pub async fn cluster_pointer(&self, cluster: u32) -> Result<u64> {
        if cluster == self.header.cluster_count {
            return Ok(self.cluster_data_end());
        }
        if cluster > self.header.cluster_count {
            return Err(ZimError::format(format!(
                "cluster {} out of range ({} clusters)",
                cluster, self.header.cluster_count
            )));
        }
        let pos = self.header.cluster_ptr_pos + cluster as u64 * CLUSTER_PTR_WIDTH;
        let buf = self.reader.read_range(pos, CLUSTER_PTR_WIDTH as usize).await?;
        Ok(LittleEndian::read_u64(&buf))
    }

    /// Byte range `[start, end)` occupied by cluster `cluster`.
    pub async fn cluster_range(&self, cluster: u32) -> Result<(u64, u64)> {
        if cluster >= self.header.cluster_count {
            return Err(ZimError::format(format!(
                "cluster {} out of range ({} clusters)",
                cluster, self.header.cluster_count
            )));
        }

        // Adjacent pointers are fetched together when both are real entries
        let (start, end) = if cluster + 1 < self.header.cluster_count {
            let pos = self.header.cluster_ptr_pos + cluster as u64 * CLUSTER_PTR_WIDTH;
            let buf = self
                .reader
                .read_range(pos, 2 * CLUSTER_PTR_WIDTH as usize)
                .await?;
            (
                LittleEndian::read_u64(&buf[..8]),
                LittleEndian::read_u64(&buf[8..]),
            )
        } else {
            (
                self.cluster_pointer(cluster).await?,
                self.cluster_data_end(),
            )
        };

        if start >= end || end > self.size {
            return Err(ZimError::format(format!(
                "cluster {} has invalid range {}..{}",
                cluster, start, end
            )));
        }
        Ok((start, end))
    }

    fn cluster_data_end(&self) -> u64 {
        let pos = self.header.checksum_pos;
        if pos == 0 || pos > self.size {
            self.size
        } else {
            pos
        }
    }

    /// The 16-byte archive checksum, if the header points at one.
    pub async fn checksum(&self) -> Result<Option<[u8; 16]>> {
        let pos = self.header.checksum_pos;
        if pos == 0 || pos.checked_add(16).is_none_or(|end| end > self.size) {
            return Ok(None);
        }
        let buf = self.reader.read_range(pos, 16).await?;
        let mut sum = [0u8; 16];
        sum.copy_from_slice(&buf);
        Ok(Some(sum))
    }

    /// Decode the entry at URL-order `index`.
    ///
    /// `initial_window` is the first read size; it doubles until the record
    /// fits, up to `max_window`.
    pub async fn read_entry(
        &self,
        index: u32,
        initial_window: usize,
        max_window: usize,
    ) -> Result<DirEntry> {
        let offset = self.url_pointer(index).await?;
        if offset >= self.size {
            return Err(ZimError::format(format!(
                "entry {} points past the archive end ({})",
                index, offset
            )));
        }

        let mut window = initial_window.max(16);
        loop {
            let len = (window as u64).min(self.size - offset) as usize;
            let buf = self.reader.read_range(offset, len).await?;
            if let Some(mut entry) = DirEntry::from_bytes(index, &buf)? {
                entry.mime_type = self.resolve_mime(&entry)?;
                tracing::trace!("Decoded entry {} {}", index, entry.full_path());
                return Ok(entry);
            }

            let at_end = offset + len as u64 >= self.size;
            if at_end || window >= max_window {
                return Err(ZimError::format(format!(
                    "entry {} at offset {} is truncated",
                    index, offset
                )));
            }
            window *= 2;
        }
    }

    fn resolve_mime(&self, entry: &DirEntry) -> Result<Option<Arc<str>>> {
        match entry.kind {
            EntryKind::Content { mime_index, .. } => self
                .mime_types
                .get(mime_index as usize)
                .cloned()
                .map(Some)
                .ok_or(ZimError::MimeIndexOutOfRange {
                    index: mime_index,
                    count: self.mime_types.len(),
                }),
            _ => Ok(None),
        }
    }

    fn check_entry_index(&self, index: u32) -> Result<()> {
        if index >= self.header.entry_count {
            return Err(ZimError::EntryOutOfRange {
                index,
                count: self.header.entry_count,
            });
        }
        Ok(())
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

/// Check that every structure the header points at lies inside the archive.
fn validate_layout(header: &Header, size: u64) -> Result<()> {
    let lists = [
        (
            "url pointer list",
            header.url_ptr_pos,
            header.entry_count as u64 * URL_PTR_WIDTH,
        ),
        (
            "title pointer list",
            header.title_ptr_pos,
            header.entry_count as u64 * TITLE_PTR_WIDTH,
        ),
        (
            "cluster pointer list",
            header.cluster_ptr_pos,
            header.cluster_count as u64 * CLUSTER_PTR_WIDTH,
        ),
    ];
    for (name, pos, len) in lists {
        if pos.checked_add(len).is_none_or(|end| end > size) {
            return Err(ZimError::format(format!(
                "{} at {} (+{}) exceeds archive size {}",
                name, pos, len, size
            )));
        }
    }
    if header.mime_list_pos >= size {
        return Err(ZimError::format("mimetype list position past the archive end"));
    }
    if header.main_page != Header::NO_PAGE && header.main_page >= header.entry_count {
        return Err(ZimError::EntryOutOfRange {
            index: header.main_page,
            count: header.entry_count,
        });
    }
    Ok(())
}

async fn read_mime_list<R: ReadAt>(
    reader: &R,
    header: &Header,
    size: u64,
) -> Result<Vec<Arc<str>>> {
    let start = header.mime_list_pos;
    // The list ends before whichever structure follows it
    let end = [
        header.url_ptr_pos,
        header.title_ptr_pos,
        header.cluster_ptr_pos,
        header.checksum_pos,
        size,
    ]
    .into_iter()
    .filter(|&pos| pos > start)
    .min()
    .unwrap_or(size)
    .min(start + MAX_MIME_LIST_SIZE);

    let buf = reader.read_range(start, (end - start) as usize).await?;
    parse_mime_list(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    /// Header, mimetypes, one URL pointer, one title pointer, one entry and
    /// one cluster pointer, with no clusters behind it.
    fn tiny_archive(checksum_pos: u64) -> Vec<u8> {
        let mime_list = b"text/html\0text/plain\0\0";
        let entry = DirEntry {
            index: 0,
            namespace: Namespace::ARTICLE,
            url: "Home.html".to_string(),
            title: "Home".to_string(),
            revision: 0,
            kind: EntryKind::Content {
                mime_index: 1,
                cluster: 0,
                blob: 0,
            },
            mime_type: None,
            parameter: Vec::new(),
        }
        .to_bytes();

        let mime_list_pos = Header::SIZE as u64;
        let url_ptr_pos = mime_list_pos + mime_list.len() as u64;
        let title_ptr_pos = url_ptr_pos + 8;
        let entry_pos = title_ptr_pos + 4;
        let cluster_ptr_pos = entry_pos + entry.len() as u64;
        let header = Header {
            major_version: 5,
            minor_version: 0,
            uuid: [7; 16],
            entry_count: 1,
            cluster_count: 1,
            url_ptr_pos,
            title_ptr_pos,
            cluster_ptr_pos,
            mime_list_pos,
            main_page: 0,
            layout_page: Header::NO_PAGE,
            checksum_pos,
        };

        let mut out = header.to_bytes();
        out.extend_from_slice(mime_list);
        out.extend_from_slice(&entry_pos.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&entry);
        out.extend_from_slice(&(cluster_ptr_pos + 8).to_le_bytes());
        out.extend_from_slice(&[0u8; 24]);
        out
    }

    async fn open(data: Vec<u8>) -> Result<ZimParser<MemoryReader>> {
        ZimParser::open(Arc::new(MemoryReader::new(data))).await
    }

    #[tokio::test]
    async fn test_open_and_read_entry() {
        let parser = open(tiny_archive(0)).await.unwrap();
        let mimes: Vec<&str> = parser.mime_types().iter().map(|m| &**m).collect();
        assert_eq!(mimes, vec!["text/html", "text/plain"]);

        // A tiny first window forces the read to widen
        let entry = parser.read_entry(0, 16, 4096).await.unwrap();
        assert_eq!(entry.full_path(), "A/Home.html");
        assert_eq!(entry.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(parser.title_pointer(0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_entry_window_limit() {
        let parser = open(tiny_archive(0)).await.unwrap();
        let err = parser.read_entry(0, 16, 16).await.unwrap_err();
        assert!(err.is_format());
    }

    #[tokio::test]
    async fn test_index_bounds() {
        let parser = open(tiny_archive(0)).await.unwrap();
        assert!(matches!(
            parser.url_pointer(1).await,
            Err(ZimError::EntryOutOfRange { index: 1, count: 1 })
        ));
        assert!(parser.cluster_pointer(2).await.is_err());
    }

    #[tokio::test]
    async fn test_cluster_end_sentinel() {
        let data = tiny_archive(0);
        let size = data.len() as u64;
        let parser = open(data).await.unwrap();
        assert_eq!(parser.cluster_pointer(1).await.unwrap(), size);
        assert_eq!(parser.checksum().await.unwrap(), None);

        let data = tiny_archive(size - 16);
        let parser = open(data).await.unwrap();
        assert_eq!(parser.cluster_pointer(1).await.unwrap(), size - 16);
        assert_eq!(parser.checksum().await.unwrap(), Some([0; 16]));

        // A checksum position beyond the archive falls back to its size
        let parser = open(tiny_archive(size * 2)).await.unwrap();
        assert_eq!(parser.cluster_pointer(1).await.unwrap(), size);
    }

    #[tokio::test]
    async fn test_checksum_position_near_u64_max() {
        let data = tiny_archive(u64::MAX - 4);
        let size = data.len() as u64;
        let parser = open(data).await.unwrap();
        assert_eq!(parser.checksum().await.unwrap(), None);
        assert_eq!(parser.cluster_pointer(1).await.unwrap(), size);
    }

    #[tokio::test]
    async fn test_rejects_bad_layout() {
        let mut data = tiny_archive(0);
        data.truncate(Header::SIZE + 4);
        assert!(open(data).await.err().unwrap().is_format());

        let err = open(vec![0u8; 10]).await.err().unwrap();
        assert!(err.is_format());
    }
}
