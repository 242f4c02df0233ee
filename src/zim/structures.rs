use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::error::{Result, ZimError};

/// Single-byte tag partitioning the entry space by content kind.
///
/// The format does not close the set of namespaces, so any byte is accepted;
/// the constants below are the ones with defined meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace(pub u8);

impl Namespace {
    /// Articles in archives predating the unified content namespace
    pub const ARTICLE: Namespace = Namespace(b'A');
    /// Unified content namespace (format 6.1 and later)
    pub const CONTENT: Namespace = Namespace(b'C');
    pub const IMAGE: Namespace = Namespace(b'I');
    /// Layout entries: stylesheets, scripts, the legacy main page
    pub const LAYOUT: Namespace = Namespace(b'-');
    pub const METADATA: Namespace = Namespace(b'M');
    pub const WELL_KNOWN: Namespace = Namespace(b'W');
    pub const INDEX: Namespace = Namespace(b'X');

    pub fn as_char(self) -> char {
        self.0 as char
    }

    /// The namespace sorting directly after this one, if any.
    pub fn next(self) -> Option<Namespace> {
        self.0.checked_add(1).map(Namespace)
    }
}

impl TryFrom<char> for Namespace {
    type Error = ZimError;

    /// Namespaces are single bytes, so only ASCII characters convert.
    fn try_from(c: char) -> Result<Self> {
        if c.is_ascii() {
            Ok(Namespace(c as u8))
        } else {
            Err(ZimError::format(format!("namespace {:?} is not ASCII", c)))
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Archive header - 80 bytes
#[derive(Debug, Clone)]
pub struct Header {
    pub major_version: u16,
    pub minor_version: u16,
    pub uuid: [u8; 16],
    pub entry_count: u32,
    pub cluster_count: u32,
    pub url_ptr_pos: u64,
    pub title_ptr_pos: u64,
    pub cluster_ptr_pos: u64,
    pub mime_list_pos: u64,
    pub main_page: u32,
    pub layout_page: u32,
    pub checksum_pos: u64,
}

impl Header {
    pub const MAGIC: u32 = 72_173_914;
    pub const SIZE: usize = 80;
    /// Entry index meaning "no such page"
    pub const NO_PAGE: u32 = u32::MAX;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(ZimError::format("header truncated"));
        }

        let mut cursor = Cursor::new(data);

        let magic = cursor.read_u32::<LittleEndian>()?;
        if magic != Self::MAGIC {
            return Err(ZimError::InvalidMagic(magic));
        }

        let major_version = cursor.read_u16::<LittleEndian>()?;
        let minor_version = cursor.read_u16::<LittleEndian>()?;
        if !(5..=6).contains(&major_version) {
            return Err(ZimError::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }

        let mut uuid = [0u8; 16];
        cursor.read_exact(&mut uuid)?;

        Ok(Self {
            major_version,
            minor_version,
            uuid,
            entry_count: cursor.read_u32::<LittleEndian>()?,
            cluster_count: cursor.read_u32::<LittleEndian>()?,
            url_ptr_pos: cursor.read_u64::<LittleEndian>()?,
            title_ptr_pos: cursor.read_u64::<LittleEndian>()?,
            cluster_ptr_pos: cursor.read_u64::<LittleEndian>()?,
            mime_list_pos: cursor.read_u64::<LittleEndian>()?,
            main_page: cursor.read_u32::<LittleEndian>()?,
            layout_page: cursor.read_u32::<LittleEndian>()?,
            checksum_pos: cursor.read_u64::<LittleEndian>()?,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        // Writing into a Vec cannot fail
        let _ = self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut Vec<u8>) -> std::io::Result<()> {
        out.write_u32::<LittleEndian>(Self::MAGIC)?;
        out.write_u16::<LittleEndian>(self.major_version)?;
        out.write_u16::<LittleEndian>(self.minor_version)?;
        out.extend_from_slice(&self.uuid);
        out.write_u32::<LittleEndian>(self.entry_count)?;
        out.write_u32::<LittleEndian>(self.cluster_count)?;
        out.write_u64::<LittleEndian>(self.url_ptr_pos)?;
        out.write_u64::<LittleEndian>(self.title_ptr_pos)?;
        out.write_u64::<LittleEndian>(self.cluster_ptr_pos)?;
        out.write_u64::<LittleEndian>(self.mime_list_pos)?;
        out.write_u32::<LittleEndian>(self.main_page)?;
        out.write_u32::<LittleEndian>(self.layout_page)?;
        out.write_u64::<LittleEndian>(self.checksum_pos)?;
        Ok(())
    }

    /// Whether the archive uses the unified `C` content namespace.
    pub fn has_new_namespace_scheme(&self) -> bool {
        self.major_version >= 6 && self.minor_version >= 1
    }
}

/// Where an entry's data lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Content {
        mime_index: u16,
        cluster: u32,
        blob: u32,
    },
    Redirect {
        target: u32,
    },
    /// Legacy placeholder entries carrying no data
    LinkTarget,
    Deleted,
}

impl EntryKind {
    pub const REDIRECT: u16 = 0xFFFF;
    pub const LINK_TARGET: u16 = 0xFFFE;
    pub const DELETED: u16 = 0xFFFD;

    fn mime_field(&self) -> u16 {
        match self {
            EntryKind::Content { mime_index, .. } => *mime_index,
            EntryKind::Redirect { .. } => Self::REDIRECT,
            EntryKind::LinkTarget => Self::LINK_TARGET,
            EntryKind::Deleted => Self::DELETED,
        }
    }
}

/// A decoded directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Position in URL order
    pub index: u32,
    pub namespace: Namespace,
    pub url: String,
    /// Display title; empty when the title is the url
    pub title: String,
    pub revision: u32,
    pub kind: EntryKind,
    /// Resolved mimetype, content entries only
    pub mime_type: Option<Arc<str>>,
    pub parameter: Vec<u8>,
}

impl DirEntry {
    /// Size of the fixed part shared by all variants
    const BASE_SIZE: usize = 8;

    pub fn is_redirect(&self) -> bool {
        matches!(self.kind, EntryKind::Redirect { .. })
    }

    pub fn is_content(&self) -> bool {
        matches!(self.kind, EntryKind::Content { .. })
    }

    pub fn redirect_target(&self) -> Option<u32> {
        match self.kind {
            EntryKind::Redirect { target } => Some(target),
            _ => None,
        }
    }

    pub fn title_or_url(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }

    /// `namespace/url`, the form accepted by path lookups
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.namespace, self.url)
    }

    /// Decode an entry from the start of `data`.
    ///
    /// Returns `Ok(None)` when `data` ends before the record does, so the
    /// caller can retry with a larger window. The mimetype is left
    /// unresolved.
    pub fn from_bytes(index: u32, data: &[u8]) -> Result<Option<Self>> {
        if data.len() < Self::BASE_SIZE {
            return Ok(None);
        }

        let mut cursor = Cursor::new(data);
        let mime_field = cursor.read_u16::<LittleEndian>()?;
        let parameter_len = cursor.read_u8()? as usize;
        let namespace = Namespace(cursor.read_u8()?);
        let revision = cursor.read_u32::<LittleEndian>()?;

        let fixed = match mime_field {
            EntryKind::REDIRECT => 4,
            EntryKind::LINK_TARGET | EntryKind::DELETED => 0,
            _ => 8,
        };
        if data.len() < Self::BASE_SIZE + fixed {
            return Ok(None);
        }

        let kind = match mime_field {
            EntryKind::REDIRECT => EntryKind::Redirect {
                target: cursor.read_u32::<LittleEndian>()?,
            },
            EntryKind::LINK_TARGET => EntryKind::LinkTarget,
            EntryKind::DELETED => EntryKind::Deleted,
            mime_index => EntryKind::Content {
                mime_index,
                cluster: cursor.read_u32::<LittleEndian>()?,
                blob: cursor.read_u32::<LittleEndian>()?,
            },
        };

        let mut pos = cursor.position() as usize;
        let Some(url) = read_nul_string(data, &mut pos)? else {
            return Ok(None);
        };
        let Some(title) = read_nul_string(data, &mut pos)? else {
            return Ok(None);
        };
        if data.len() < pos + parameter_len {
            return Ok(None);
        }
        let parameter = data[pos..pos + parameter_len].to_vec();

        Ok(Some(Self {
            index,
            namespace,
            url,
            title,
            revision,
            kind,
            mime_type: None,
            parameter,
        }))
    }

    /// Encode the entry in its on-disk form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            Self::BASE_SIZE + 8 + self.url.len() + self.title.len() + 2 + self.parameter.len(),
        );
        out.extend_from_slice(&self.kind.mime_field().to_le_bytes());
        out.push(self.parameter.len() as u8);
        out.push(self.namespace.0);
        out.extend_from_slice(&self.revision.to_le_bytes());
        match self.kind {
            EntryKind::Content { cluster, blob, .. } => {
                out.extend_from_slice(&cluster.to_le_bytes());
                out.extend_from_slice(&blob.to_le_bytes());
            }
            EntryKind::Redirect { target } => out.extend_from_slice(&target.to_le_bytes()),
            EntryKind::LinkTarget | EntryKind::Deleted => {}
        }
        out.extend_from_slice(self.url.as_bytes());
        out.push(0);
        out.extend_from_slice(self.title.as_bytes());
        out.push(0);
        out.extend_from_slice(&self.parameter);
        out
    }
}

/// Read a NUL-terminated UTF-8 string, `None` if no terminator is in `data`.
fn read_nul_string(data: &[u8], pos: &mut usize) -> Result<Option<String>> {
    let rest = &data[*pos..];
    let Some(len) = rest.iter().position(|&b| b == 0) else {
        return Ok(None);
    };
    let s = String::from_utf8(rest[..len].to_vec())?;
    *pos += len + 1;
    Ok(Some(s))
}

/// Parse the NUL-separated mimetype list, which ends with an empty string.
pub fn parse_mime_list(data: &[u8]) -> Result<Vec<Arc<str>>> {
    let mut types = Vec::new();
    let mut pos = 0;
    loop {
        match read_nul_string(data, &mut pos)? {
            Some(s) if s.is_empty() => return Ok(types),
            Some(s) => types.push(Arc::from(s)),
            None => return Err(ZimError::format("unterminated mimetype list")),
        }
    }
}

/// Cluster compression, the low nibble of the cluster info byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Stored,
    Zlib,
    Bzip2,
    Xz,
    Zstd,
    Unknown(u8),
}

impl Compression {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 | 1 => Compression::Stored,
            2 => Compression::Zlib,
            3 => Compression::Bzip2,
            4 => Compression::Xz,
            5 => Compression::Zstd,
            _ => Compression::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Compression::Stored => 1,
            Compression::Zlib => 2,
            Compression::Bzip2 => 3,
            Compression::Xz => 4,
            Compression::Zstd => 5,
            Compression::Unknown(v) => *v,
        }
    }
}

/// Decoded cluster info byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterInfo {
    pub compression: Compression,
    /// Extended clusters use 8-byte blob offsets
    pub extended: bool,
}

impl ClusterInfo {
    const EXTENDED_FLAG: u8 = 0x10;

    pub fn from_u8(value: u8) -> Self {
        Self {
            compression: Compression::from_u8(value & 0x0F),
            extended: value & Self::EXTENDED_FLAG != 0,
        }
    }

    pub fn as_u8(&self) -> u8 {
        let flag = if self.extended { Self::EXTENDED_FLAG } else { 0 };
        (self.compression.as_u8() & 0x0F) | flag
    }

    pub fn offset_width(&self) -> usize {
        if self.extended { 8 } else { 4 }
    }
}
