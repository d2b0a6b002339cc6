pub mod disk;
pub mod memory;

use crate::core::cache::KeyValueCollection;
use crate::core::config::AppConfig;
use disk::DiskCollection;
use memory::MemoryCollection;
use std::sync::Arc;
use tracing::{debug, warn};

const SNAPSHOT_PARTITION: &str = "snapshots";

/// Opens the snapshot cache for `config`. Persistent under
/// `<data_path>/cache` when possible, in memory otherwise.
pub fn open_snapshot_cache(config: &AppConfig) -> Arc<dyn KeyValueCollection> {
    if !config.cache.enabled {
        debug!("Disk cache disabled, using memory");
        return Arc::new(MemoryCollection::new());
    }

    let opened = config.default_data_path().and_then(|path| {
        let cache_dir = path.join("cache");
        DiskCollection::open(&cache_dir, SNAPSHOT_PARTITION)
    });
    match opened {
        Ok(collection) => Arc::new(collection),
        Err(e) => {
            warn!("Could not open disk cache, falling back to memory: {e:#}");
            Arc::new(MemoryCollection::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn persists_under_data_path() {
        let dir = tempdir().unwrap();
        let config = AppConfig {
            data_path: Some(dir.path().to_string_lossy().into_owned()),
            ..AppConfig::default()
        };

        {
            let cache = open_snapshot_cache(&config);
            cache.put(b"key", b"value", None).await;
        }
        assert!(dir.path().join("cache").exists());

        let cache = open_snapshot_cache(&config);
        assert_eq!(cache.get(b"key").await, Some(b"value".to_vec()));
    }

    #[tokio::test]
    async fn disabled_cache_stays_in_memory() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig {
            data_path: Some(dir.path().to_string_lossy().into_owned()),
            ..AppConfig::default()
        };
        config.cache.enabled = false;

        let cache = open_snapshot_cache(&config);
        cache.put(b"key", b"value", None).await;
        assert_eq!(cache.get(b"key").await, Some(b"value".to_vec()));
        assert!(!dir.path().join("cache").exists());
    }
}
