use async_trait::async_trait;
use std::time::Duration;

/// Byte-oriented cache used to keep downloaded snapshots around between runs.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Stores `value`; with a `ttl` the entry stops being returned once the
    /// duration has elapsed.
    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>);

    async fn remove(&self, key: &[u8]);

    async fn clear(&self);
}
