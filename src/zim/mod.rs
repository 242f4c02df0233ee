//! ZIM archive parsing and lookup.
//!
//! This module provides random access to ZIM archives: path lookup, title
//! prefix search, redirect resolution, metadata and entry-point access.
//!
//! ## Architecture
//!
//! The module is organized into the following components:
//!
//! - [`structures`]: Header, directory entry and cluster info records
//! - [`parser`]: Header, pointer list and directory entry reads from raw bytes
//! - [`codec`]: Pluggable cluster decompression
//! - [`cluster`]: Cluster decoding plus a coalescing cluster cache
//! - [`search`]: Case-variant prefix search over the title index
//! - [`archive`]: High-level lookup API for end users
//!
//! ## ZIM Format Overview
//!
//! A ZIM file consists of:
//! 1. A fixed 80-byte header locating everything else
//! 2. A mimetype list
//! 3. Three pointer lists: entries in URL order, entries in title order
//!    (as URL-order indices) and clusters
//! 4. Directory entries, each either content (cluster + blob) or a redirect
//! 5. Compressed clusters of blobs
//! 6. An MD5 checksum
//!
//! Only the header and mimetype list are read up front. Everything else is
//! fetched on demand with small range reads, which suits split archives and
//! HTTP Range sources alike.
//!
//! ## Supported Features
//!
//! - Format versions 5 and 6, including the unified `C` namespace
//! - Stored, zlib, xz and zstd clusters, regular and extended
//!
//! ## Limitations
//!
//! - No bzip2 clusters
//! - Read only
//! - The checksum is exposed but not verified

mod archive;
mod cluster;
mod codec;
mod parser;
mod search;
mod structures;

pub use archive::Archive;
pub use cluster::{Cluster, ClusterStore};
pub use codec::{Decompressor, decompressor};
pub use parser::ZimParser;
pub use search::case_variants;
pub use structures::*;
