use crate::core::cache::KeyValueCollection;
use anyhow::Result;
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Stored values carry an 8 byte big-endian expiry (unix millis, 0 = never)
/// ahead of the payload.
const HEADER_LEN: usize = 8;

pub struct DiskCollection {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn open(path: &Path, name: &str) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let keyspace = fjall::Config::new(path).open()?;
        let partition = keyspace.open_partition(name, PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(stored) = self.partition.get(key)? else {
            debug!(key = %String::from_utf8_lossy(key), "Cache MISS");
            return Ok(None);
        };
        if stored.len() < HEADER_LEN {
            self.partition.remove(key)?;
            return Ok(None);
        }
        let (header, payload) = stored.split_at(HEADER_LEN);
        let mut expiry = [0u8; HEADER_LEN];
        expiry.copy_from_slice(header);
        let expires_at = u64::from_be_bytes(expiry);
        if expires_at != 0 && now_millis() >= expires_at {
            debug!(key = %String::from_utf8_lossy(key), "Cache entry expired");
            self.partition.remove(key)?;
            return Ok(None);
        }
        debug!(key = %String::from_utf8_lossy(key), "Cache HIT");
        Ok(Some(payload.to_vec()))
    }

    fn write(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map_or(0, |d| {
            now_millis().saturating_add(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        });
        let mut stored = Vec::with_capacity(HEADER_LEN + value.len());
        stored.extend_from_slice(&expires_at.to_be_bytes());
        stored.extend_from_slice(value);
        self.partition.insert(key, stored)?;
        self.keyspace.persist(PersistMode::Buffer)?;
        debug!(key = %String::from_utf8_lossy(key), bytes = value.len(), "Cache PUT");
        Ok(())
    }

    fn remove_all(&self) -> Result<()> {
        let keys = self
            .partition
            .keys()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for key in keys {
            self.partition.remove(key)?;
        }
        Ok(())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.read(key) {
            Ok(value) => value,
            Err(e) => {
                debug!("DiskCollection get error: {e}");
                None
            }
        }
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) {
        if let Err(e) = self.write(key, value, ttl) {
            debug!("DiskCollection put error: {e}");
        }
    }

    async fn remove(&self, key: &[u8]) {
        if let Err(e) = self.partition.remove(key) {
            debug!("DiskCollection remove error: {e}");
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.remove_all() {
            debug!("DiskCollection clear error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::time::sleep;

    #[tokio::test]
    async fn stores_and_returns_values() {
        let dir = tempdir().unwrap();
        let cache = DiskCollection::open(dir.path(), "snapshots").unwrap();

        assert!(cache.get(b"inf_cadastral_fi_20200302.csv").await.is_none());
        cache
            .put(b"inf_cadastral_fi_20200302.csv", b"CNPJ_FUNDO;DENOM_SOCIAL", None)
            .await;
        assert_eq!(
            cache.get(b"inf_cadastral_fi_20200302.csv").await,
            Some(b"CNPJ_FUNDO;DENOM_SOCIAL".to_vec())
        );
    }

    #[tokio::test]
    async fn keeps_non_utf8_payloads() {
        let dir = tempdir().unwrap();
        let cache = DiskCollection::open(dir.path(), "snapshots").unwrap();
        let latin1 = vec![b'A', 0xC7, 0xD5, b'E', b'S'];

        cache.put(b"key", &latin1, None).await;
        assert_eq!(cache.get(b"key").await, Some(latin1));
    }

    #[tokio::test]
    async fn survives_reopening() {
        let dir = tempdir().unwrap();
        {
            let cache = DiskCollection::open(dir.path(), "snapshots").unwrap();
            cache.put(b"key", b"value", None).await;
        }
        let cache = DiskCollection::open(dir.path(), "snapshots").unwrap();
        assert_eq!(cache.get(b"key").await, Some(b"value".to_vec()));
    }

    #[tokio::test]
    async fn expires_entries_after_ttl() {
        let dir = tempdir().unwrap();
        let cache = DiskCollection::open(dir.path(), "snapshots").unwrap();

        cache
            .put(b"key", b"value", Some(Duration::from_millis(10)))
            .await;
        assert!(cache.get(b"key").await.is_some());

        sleep(Duration::from_millis(20)).await;
        assert!(cache.get(b"key").await.is_none());
    }

    #[tokio::test]
    async fn removes_and_clears() {
        let dir = tempdir().unwrap();
        let cache = DiskCollection::open(dir.path(), "snapshots").unwrap();

        cache.put(b"a", b"1", None).await;
        cache.put(b"b", b"2", None).await;
        cache.remove(b"a").await;
        assert!(cache.get(b"a").await.is_none());

        cache.clear().await;
        assert!(cache.get(b"b").await.is_none());
    }
}
