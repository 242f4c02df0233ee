//! Configuration for opening archives
//!
//! Centralized tunables with sensible defaults.

/// Tunables applied to an [`Archive`](crate::Archive)
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Decoded directory entries kept in memory
    pub entry_cache_capacity: usize,

    /// Decompressed clusters kept in memory
    pub cluster_cache_capacity: usize,

    // -------------------------------------------------------------------------
    // Lookup Policy
    // -------------------------------------------------------------------------
    /// Redirect hops followed before giving up with a format error
    pub max_redirect_chain: usize,

    /// Random draws attempted before reporting no eligible entry
    pub random_retries: usize,

    // -------------------------------------------------------------------------
    // Read Sizes
    // -------------------------------------------------------------------------
    /// First read size when decoding a directory entry (bytes)
    pub dirent_read_size: usize,

    /// Largest directory entry accepted (bytes)
    pub max_dirent_size: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            entry_cache_capacity: 4096,
            cluster_cache_capacity: 16,
            max_redirect_chain: 32,
            random_retries: 64,
            dirent_read_size: 512,
            max_dirent_size: 64 * 1024,
        }
    }
}

impl ArchiveOptions {
    pub fn entry_cache_capacity(mut self, capacity: usize) -> Self {
        self.entry_cache_capacity = capacity;
        self
    }

    pub fn cluster_cache_capacity(mut self, capacity: usize) -> Self {
        self.cluster_cache_capacity = capacity;
        self
    }

    pub fn max_redirect_chain(mut self, hops: usize) -> Self {
        self.max_redirect_chain = hops;
        self
    }

    pub fn random_retries(mut self, retries: usize) -> Self {
        self.random_retries = retries;
        self
    }

    pub fn dirent_read_size(mut self, size: usize) -> Self {
        self.dirent_read_size = size;
        self
    }

    pub fn max_dirent_size(mut self, size: usize) -> Self {
        self.max_dirent_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_chain() {
        let options = ArchiveOptions::default()
            .entry_cache_capacity(8)
            .cluster_cache_capacity(2)
            .max_redirect_chain(4)
            .random_retries(3)
            .dirent_read_size(128)
            .max_dirent_size(1024);
        assert_eq!(options.entry_cache_capacity, 8);
        assert_eq!(options.cluster_cache_capacity, 2);
        assert_eq!(options.max_redirect_chain, 4);
        assert_eq!(options.random_retries, 3);
        assert_eq!(options.dirent_read_size, 128);
        assert_eq!(options.max_dirent_size, 1024);
    }
}
