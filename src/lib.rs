//! # rzim
//!
//! A Rust ZIM archive reader for local, split and HTTP Range sources.
//!
//! ZIM archives package an entire offline content corpus (articles, images,
//! stylesheets, metadata) into one file. This library gives random access
//! to such an archive without ever needing a unified filesystem view: the
//! archive may be split into many parts, each of which only has to support
//! reading a byte range.
//!
//! ## Features
//!
//! - Open archives from local files, split `.zimaa`/`.zimab`/... parts or HTTP URLs
//! - Look up entries by path, follow redirects
//! - Case-insensitive title prefix search
//! - Metadata, main page and random entry access
//! - Stored, zlib, xz and zstd clusters with a shared decompression cache
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rzim::{Archive, HttpRangeReader, ReadAt};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Create a reader for a remote archive
//!     let reader: Arc<dyn ReadAt> =
//!         Arc::new(HttpRangeReader::new("https://example.com/wiki.zim".to_string()).await?);
//!
//!     let archive = Archive::open(vec![reader]).await?;
//!
//!     // Search article titles
//!     let hits = archive
//!         .find_dir_entries_with_prefix("ray", archive.article_namespace(), 10)
//!         .await?;
//!     for entry in &hits {
//!         println!("{}", entry.title_or_url());
//!     }
//!
//!     if let Some(language) = archive.metadata_string("Language").await? {
//!         println!("language: {}", language);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod zim;

pub use cli::Cli;
pub use config::ArchiveOptions;
pub use error::{Result, ZimError};
pub use io::{HttpRangeReader, LocalFileReader, MemoryReader, MultiPartReader, ReadAt};
pub use zim::{Archive, DirEntry, EntryKind, Namespace};
