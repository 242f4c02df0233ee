use super::ReadAt;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Local file reader with random access support
pub struct LocalFileReader {
    file: std::fs::File,
    size: u64,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let size = file.metadata()?.len();
        tracing::trace!("Opened {} ({} bytes)", path.display(), size);
        Ok(Self { file, size })
    }

    /// Find the physical parts of a possibly split archive.
    ///
    /// Split archives are named `name.zimaa`, `name.zimab`, ... Passing either
    /// the first part or the unsplit `name.zim` (when it does not exist itself)
    /// returns every consecutive part that exists. Anything else is returned
    /// unchanged as a single part.
    pub fn discover_parts(path: &Path) -> Vec<PathBuf> {
        let name = path.to_string_lossy();
        let base = if let Some(base) = name.strip_suffix("aa").filter(|b| b.ends_with(".zim")) {
            base.to_string()
        } else if !path.exists() && name.ends_with(".zim") {
            name.to_string()
        } else {
            return vec![path.to_path_buf()];
        };

        let mut parts = Vec::new();
        'outer: for first in b'a'..=b'z' {
            for second in b'a'..=b'z' {
                let candidate =
                    PathBuf::from(format!("{}{}{}", base, first as char, second as char));
                if !candidate.exists() {
                    break 'outer;
                }
                parts.push(candidate);
            }
        }

        if parts.is_empty() {
            vec![path.to_path_buf()]
        } else {
            parts
        }
    }
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            Ok(self.file.read_at(buf, offset)?)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            Ok(self.file.seek_read(buf, offset)?)
        }

        #[cfg(not(any(unix, windows)))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))?;
            Ok(file.read(buf)?)
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}
