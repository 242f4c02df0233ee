use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use rand::Rng;

use crate::config::ArchiveOptions;
use crate::error::{Result, ZimError};
use crate::io::{MultiPartReader, ReadAt};

use super::cluster::ClusterStore;
use super::parser::ZimParser;
use super::structures::{DirEntry, EntryKind, Header, Namespace};

/// An opened, read-only archive
pub struct Archive<R: ReadAt = MultiPartReader> {
    parser: Arc<ZimParser<R>>,
    clusters: ClusterStore<R>,
    entries: Mutex<LruCache<u32, DirEntry>>,
    options: ArchiveOptions,
}

impl Archive<MultiPartReader> {
    /// Open an archive stored as one or more consecutive parts.
    pub async fn open(parts: Vec<Arc<dyn ReadAt>>) -> Result<Self> {
        Self::open_with_options(parts, ArchiveOptions::default()).await
    }

    pub async fn open_with_options(
        parts: Vec<Arc<dyn ReadAt>>,
        options: ArchiveOptions,
    ) -> Result<Self> {
        let reader = Arc::new(MultiPartReader::new(parts));
        Self::from_reader(reader, options).await
    }
}

impl<R: ReadAt + 'static> Archive<R> {
    pub async fn from_reader(reader: Arc<R>, options: ArchiveOptions) -> Result<Self> {
        let parser = Arc::new(ZimParser::open(reader).await?);
        let clusters = ClusterStore::new(parser.clone(), options.cluster_cache_capacity);
        let capacity = NonZeroUsize::new(options.entry_cache_capacity).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            parser,
            clusters,
            entries: Mutex::new(LruCache::new(capacity)),
            options,
        })
    }

    pub fn header(&self) -> &Header {
        self.parser.header()
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    pub fn mime_types(&self) -> &[Arc<str>] {
        self.parser.mime_types()
    }

    pub fn entry_count(&self) -> u32 {
        self.parser.entry_count()
    }

    pub fn cluster_count(&self) -> u32 {
        self.parser.cluster_count()
    }

    /// Total archive size in bytes, across all parts.
    pub fn size(&self) -> u64 {
        self.parser.size()
    }

    pub async fn checksum(&self) -> Result<Option<[u8; 16]>> {
        self.parser.checksum().await
    }

    /// Namespace holding the articles: `C` in archives using the unified
    /// content namespace, `A` before that.
    pub fn article_namespace(&self) -> Namespace {
        if self.header().has_new_namespace_scheme() {
            Namespace::CONTENT
        } else {
            Namespace::ARTICLE
        }
    }

    /// Decode the entry at position `index` in URL order.
    pub async fn dir_entry_by_index(&self, index: u32) -> Result<DirEntry> {
        if let Some(entry) = self.entries.lock().get(&index).cloned() {
            return Ok(entry);
        }

        let entry = self
            .parser
            .read_entry(
                index,
                self.options.dirent_read_size,
                self.options.max_dirent_size,
            )
            .await?;
        self.entries.lock().put(index, entry.clone());
        Ok(entry)
    }

    /// Decode the entry at position `index` in title order.
    pub async fn dir_entry_by_title_index(&self, index: u32) -> Result<DirEntry> {
        let url_index = self.parser.title_pointer(index).await?;
        self.dir_entry_by_index(url_index).await
    }

    /// Look up an entry by `namespace/url` path, e.g. `A/Ray_Charles.html`.
    pub async fn get_dir_entry_by_path(&self, path: &str) -> Result<Option<DirEntry>> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let Some((ns, url)) = path.split_once('/') else {
            return Ok(None);
        };
        let mut chars = ns.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return Ok(None);
        };
        let Ok(namespace) = Namespace::try_from(c) else {
            return Ok(None);
        };
        self.find_entry(namespace, url).await
    }

    /// Binary search the URL pointer list for `(namespace, url)`.
    pub async fn find_entry(&self, namespace: Namespace, url: &str) -> Result<Option<DirEntry>> {
        let mut lo = 0u32;
        let mut hi = self.entry_count();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = self.dir_entry_by_index(mid).await?;
            match (entry.namespace, entry.url.as_str()).cmp(&(namespace, url)) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Ok(Some(entry)),
            }
        }
        Ok(None)
    }

    /// URL-order index range covered by `namespace`.
    ///
    /// Entries are sorted by namespace first, so each namespace occupies one
    /// contiguous run.
    pub async fn namespace_range(&self, namespace: Namespace) -> Result<Range<u32>> {
        let start = self.namespace_lower_bound(namespace).await?;
        let end = match namespace.next() {
            Some(next) => self.namespace_lower_bound(next).await?,
            None => self.entry_count(),
        };
        Ok(start..end)
    }

    async fn namespace_lower_bound(&self, namespace: Namespace) -> Result<u32> {
        let mut lo = 0u32;
        let mut hi = self.entry_count();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.dir_entry_by_index(mid).await?.namespace < namespace {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Follow redirects until a non-redirect entry is reached.
    ///
    /// Non-redirect entries are returned unchanged. Chains longer than
    /// [`ArchiveOptions::max_redirect_chain`] fail with
    /// [`ZimError::RedirectLimit`].
    pub async fn resolve_redirect(&self, entry: &DirEntry) -> Result<DirEntry> {
        let mut current = entry.clone();
        let mut hops = 0;
        while let Some(target) = current.redirect_target() {
            if hops >= self.options.max_redirect_chain {
                return Err(ZimError::RedirectLimit(entry.index));
            }
            current = self.dir_entry_by_index(target).await?;
            hops += 1;
        }
        if hops > 0 {
            tracing::trace!(
                "Resolved {} to {} in {} hops",
                entry.full_path(),
                current.full_path(),
                hops
            );
        }
        Ok(current)
    }

    /// Raw content of `entry`, following redirects.
    pub async fn read_binary_file(&self, entry: &DirEntry) -> Result<Vec<u8>> {
        let entry = self.resolve_redirect(entry).await?;
        match entry.kind {
            EntryKind::Content { cluster, blob, .. } => self.clusters.read_blob(cluster, blob).await,
            _ => Err(ZimError::format(format!(
                "entry {} has no content",
                entry.full_path()
            ))),
        }
    }

    /// Content of `entry` decoded as UTF-8, following redirects.
    pub async fn read_utf8_file(&self, entry: &DirEntry) -> Result<String> {
        let data = self.read_binary_file(entry).await?;
        Ok(String::from_utf8(data)?)
    }

    /// Content size of `entry` as recorded in its cluster, following redirects.
    pub async fn blob_size(&self, entry: &DirEntry) -> Result<u64> {
        let entry = self.resolve_redirect(entry).await?;
        match entry.kind {
            EntryKind::Content { cluster, blob, .. } => {
                self.clusters.cluster(cluster).await?.blob_size(blob)
            }
            _ => Ok(0),
        }
    }

    /// Raw value of metadata `key` (e.g. `Title`, `Language`).
    pub async fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.find_entry(Namespace::METADATA, key).await? {
            Some(entry) => Ok(Some(self.read_binary_file(&entry).await?)),
            None => Ok(None),
        }
    }

    /// Metadata `key` decoded as UTF-8.
    pub async fn metadata_string(&self, key: &str) -> Result<Option<String>> {
        match self.get_metadata(key).await? {
            Some(value) => Ok(Some(String::from_utf8(value)?)),
            None => Ok(None),
        }
    }

    /// The archive's entry point, with redirects resolved.
    pub async fn get_main_page_dir_entry(&self) -> Result<Option<DirEntry>> {
        self.header_page(self.header().main_page).await
    }

    /// The layout page named by the header, if any.
    pub async fn layout_page(&self) -> Result<Option<DirEntry>> {
        self.header_page(self.header().layout_page).await
    }

    async fn header_page(&self, index: u32) -> Result<Option<DirEntry>> {
        if index == Header::NO_PAGE {
            return Ok(None);
        }
        let entry = self.dir_entry_by_index(index).await?;
        Ok(Some(self.resolve_redirect(&entry).await?))
    }

    /// A uniformly drawn content entry of `namespace`, redirects resolved.
    ///
    /// Draws landing on entries without content are retried up to
    /// [`ArchiveOptions::random_retries`] times.
    pub async fn get_random_dir_entry(&self, namespace: Namespace) -> Result<DirEntry> {
        let range = self.namespace_range(namespace).await?;
        if range.is_empty() {
            return Err(ZimError::NoEligibleEntry(namespace.as_char()));
        }

        for _ in 0..self.options.random_retries.max(1) {
            let index = rand::thread_rng().gen_range(range.clone());
            let entry = self.dir_entry_by_index(index).await?;
            match self.resolve_redirect(&entry).await {
                Ok(resolved) if resolved.is_content() => return Ok(resolved),
                Ok(_) => {}
                Err(e) if e.is_format() => {
                    tracing::debug!("Skipping random entry {}: {}", index, e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(ZimError::NoEligibleEntry(namespace.as_char()))
    }

    /// Number of entries currently held in the entry cache.
    pub fn cached_entries(&self) -> usize {
        self.entries.lock().len()
    }

    /// Number of decompressed clusters currently cached.
    pub fn cached_clusters(&self) -> usize {
        self.clusters.cached_clusters()
    }
}
