//! Cluster decoding and the shared cluster cache.
//!
//! A cluster is one compressed region holding many blobs. Readers usually
//! want several blobs from the same cluster in quick succession (a page and
//! its images, a list of search results), so decoded clusters are kept in an
//! LRU cache and concurrent requests for the same cluster share a single
//! fetch and decompression.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use byteorder::{ByteOrder, LittleEndian};
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use parking_lot::Mutex;

use crate::error::{Result, ZimError};
use crate::io::ReadAt;

use super::codec::decompressor;
use super::parser::ZimParser;
use super::structures::ClusterInfo;

/// A decompressed cluster with its blob offset table
#[derive(Debug)]
pub struct Cluster {
    number: u32,
    info: ClusterInfo,
    data: Vec<u8>,
    /// `blob_count + 1` offsets into `data`; the last one ends the final blob
    offsets: Vec<u64>,
}

impl Cluster {
    /// Decode a raw cluster, info byte included.
    pub fn parse(number: u32, raw: &[u8]) -> Result<Self> {
        let Some((&info_byte, payload)) = raw.split_first() else {
            return Err(ZimError::format(format!("cluster {} is empty", number)));
        };
        let info = ClusterInfo::from_u8(info_byte);
        let data = decompressor(info.compression)?.decompress(payload)?;

        let width = info.offset_width();
        let read_offset = |i: usize| -> Option<u64> {
            let bytes = data.get(i * width..(i + 1) * width)?;
            Some(if width == 8 {
                LittleEndian::read_u64(bytes)
            } else {
                LittleEndian::read_u32(bytes) as u64
            })
        };

        // The first offset is where blob data starts, i.e. the table size
        let bad = |msg: &str| ZimError::format(format!("cluster {}: {}", number, msg));
        let first = read_offset(0).ok_or_else(|| bad("missing blob offset table"))?;
        if first < width as u64 || first % width as u64 != 0 || first > data.len() as u64 {
            return Err(bad("invalid blob offset table size"));
        }

        let count = (first / width as u64) as usize;
        let mut offsets = Vec::with_capacity(count);
        let mut prev = first;
        for i in 0..count {
            let off = read_offset(i).ok_or_else(|| bad("truncated blob offset table"))?;
            if off < prev || off > data.len() as u64 {
                return Err(bad("blob offsets out of order"));
            }
            offsets.push(off);
            prev = off;
        }

        tracing::trace!(
            "Cluster {}: {:?}, {} blobs, {} bytes",
            number,
            info.compression,
            count - 1,
            data.len()
        );

        Ok(Self {
            number,
            info,
            data,
            offsets,
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn info(&self) -> ClusterInfo {
        self.info
    }

    pub fn blob_count(&self) -> u32 {
        (self.offsets.len() - 1) as u32
    }

    /// Size of blob `blob` as recorded in the offset table.
    pub fn blob_size(&self, blob: u32) -> Result<u64> {
        let (start, end) = self.blob_span(blob)?;
        Ok(end - start)
    }

    pub fn blob(&self, blob: u32) -> Result<&[u8]> {
        let (start, end) = self.blob_span(blob)?;
        Ok(&self.data[start as usize..end as usize])
    }

    fn blob_span(&self, blob: u32) -> Result<(u64, u64)> {
        if blob >= self.blob_count() {
            return Err(ZimError::BlobOutOfRange {
                cluster: self.number,
                blob,
                count: self.blob_count(),
            });
        }
        let i = blob as usize;
        Ok((self.offsets[i], self.offsets[i + 1]))
    }
}

type ClusterResult = std::result::Result<Arc<Cluster>, Arc<ZimError>>;
type ClusterFuture = Shared<BoxFuture<'static, ClusterResult>>;

/// Fetches clusters, decompressing each at most once while it stays cached.
///
/// In-flight loads are shared futures: every caller asking for the same
/// cluster awaits the same load, and a caller that gives up simply drops its
/// handle without affecting the others.
pub struct ClusterStore<R: ReadAt> {
    parser: Arc<ZimParser<R>>,
    cache: Mutex<LruCache<u32, Arc<Cluster>>>,
    in_flight: Mutex<HashMap<u32, (u64, ClusterFuture)>>,
    next_load_id: AtomicU64,
}

impl<R: ReadAt + 'static> ClusterStore<R> {
    pub fn new(parser: Arc<ZimParser<R>>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            parser,
            cache: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
            next_load_id: AtomicU64::new(0),
        }
    }

    /// Get cluster `number`, loading it if it is not cached.
    pub async fn cluster(&self, number: u32) -> Result<Arc<Cluster>> {
        if let Some(cluster) = self.cache.lock().get(&number).cloned() {
            tracing::trace!("Cluster {} cache hit", number);
            return Ok(cluster);
        }

        let (load_id, load) = {
            let mut in_flight = self.in_flight.lock();
            // A load may have finished since the check above
            if let Some(cluster) = self.cache.lock().get(&number).cloned() {
                return Ok(cluster);
            }
            match in_flight.get(&number) {
                Some((id, load)) => {
                    tracing::trace!("Cluster {} joining in-flight load", number);
                    (*id, load.clone())
                }
                None => {
                    let id = self.next_load_id.fetch_add(1, Ordering::Relaxed);
                    let load = Self::load(self.parser.clone(), number).boxed().shared();
                    in_flight.insert(number, (id, load.clone()));
                    (id, load)
                }
            }
        };

        let result = load.await;

        {
            let mut in_flight = self.in_flight.lock();
            if matches!(in_flight.get(&number), Some((id, _)) if *id == load_id) {
                in_flight.remove(&number);
                // Failed loads are dropped so a later request retries
                if let Ok(cluster) = &result {
                    self.cache.lock().put(number, cluster.clone());
                }
            }
        }

        result.map_err(ZimError::Shared)
    }

    /// Copy blob `blob` out of cluster `cluster`.
    pub async fn read_blob(&self, cluster: u32, blob: u32) -> Result<Vec<u8>> {
        let cluster = self.cluster(cluster).await?;
        Ok(cluster.blob(blob)?.to_vec())
    }

    /// Number of decoded clusters currently cached.
    pub fn cached_clusters(&self) -> usize {
        self.cache.lock().len()
    }

    async fn load(parser: Arc<ZimParser<R>>, number: u32) -> ClusterResult {
        let (start, end) = parser.cluster_range(number).await.map_err(Arc::new)?;
        let raw = parser
            .reader()
            .read_range(start, (end - start) as usize)
            .await
            .map_err(Arc::new)?;

        tracing::debug!("Decompressing cluster {} ({} bytes)", number, raw.len());

        // Decompression is CPU bound; keep it off the async workers
        let cluster = tokio::task::spawn_blocking(move || Cluster::parse(number, &raw))
            .await
            .map_err(|e| Arc::new(ZimError::Decompress(format!("cluster task: {}", e))))?
            .map_err(Arc::new)?;

        Ok(Arc::new(cluster))
    }
}
