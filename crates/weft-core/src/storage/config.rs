//! Storage configuration.

use std::path::PathBuf;

/// Configuration for the underlying sled database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory for the database files.
    pub path: PathBuf,
    /// Page cache size in bytes.
    pub cache_capacity: u64,
    /// Whether to compress on-disk pages.
    pub compression: bool,
    /// Delete the database when dropped. Meant for tests.
    pub temporary: bool,
    /// Background flush interval in milliseconds, `None` to flush manually.
    pub flush_every_ms: Option<u64>,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache_capacity: 512 * 1024 * 1024,
            compression: true,
            temporary: false,
            flush_every_ms: Some(500),
        }
    }

    /// An in-memory throwaway configuration.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::new(),
            cache_capacity: 64 * 1024 * 1024,
            compression: false,
            temporary: true,
            flush_every_ms: None,
        }
    }

    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression)
            .flush_every_ms(self.flush_every_ms);
        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_config_opens() {
        let db = StoreConfig::temporary().to_sled_config().open().unwrap();
        db.insert(b"k", b"v").unwrap();
        assert!(db.get(b"k").unwrap().is_some());
    }
}
