//! Cluster decompression codecs.
//!
//! Each supported compression tag maps to a [`Decompressor`]; adding a codec
//! means adding an implementation and a match arm in [`decompressor`].

use std::io::Read;

use flate2::read::ZlibDecoder;
use xz2::read::XzDecoder;

use crate::error::{Result, ZimError};

use super::structures::Compression;

/// Turns a compressed cluster payload into its raw bytes
pub trait Decompressor: Send + Sync {
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>>;
}

struct Stored;

impl Decompressor for Stored {
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }
}

struct Zlib;

impl Decompressor for Zlib {
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        ZlibDecoder::new(input)
            .read_to_end(&mut out)
            .map_err(|e| ZimError::Decompress(format!("zlib: {}", e)))?;
        Ok(out)
    }
}

struct Xz;

impl Decompressor for Xz {
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        XzDecoder::new(input)
            .read_to_end(&mut out)
            .map_err(|e| ZimError::Decompress(format!("xz: {}", e)))?;
        Ok(out)
    }
}

struct Zstd;

impl Decompressor for Zstd {
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        zstd::stream::read::Decoder::new(input)
            .map_err(|e| ZimError::Decompress(format!("zstd: {}", e)))?
            .single_frame()
            .read_to_end(&mut out)
            .map_err(|e| ZimError::Decompress(format!("zstd: {}", e)))?;
        Ok(out)
    }
}

/// Look up the codec for a compression tag.
///
/// bzip2 clusters are recognized but not supported.
pub fn decompressor(compression: Compression) -> Result<&'static dyn Decompressor> {
    match compression {
        Compression::Stored => Ok(&Stored),
        Compression::Zlib => Ok(&Zlib),
        Compression::Xz => Ok(&Xz),
        Compression::Zstd => Ok(&Zstd),
        Compression::Bzip2 | Compression::Unknown(_) => {
            Err(ZimError::UnknownCompression(compression.as_u8()))
        }
    }
}
