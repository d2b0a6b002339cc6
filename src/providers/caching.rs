use crate::core::cache::KeyValueCollection;
use crate::core::period::YearMonth;
use crate::core::snapshot::{FetchOutcome, Snapshot, SnapshotFetcher, SnapshotKey};
use crate::providers::util::seconds_until;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Hour (UTC) after which the regulator has usually republished the current
/// month of daily reports.
const REFRESH_HOUR_UTC: u32 = 8;

/// Serves snapshots from a `KeyValueCollection`, fetching and storing them
/// through `inner` on a miss.
pub struct CachingFetcher<T: SnapshotFetcher> {
    inner: T,
    cache: Arc<dyn KeyValueCollection>,
}

impl<T: SnapshotFetcher> CachingFetcher<T> {
    pub fn new(inner: T, cache: Arc<dyn KeyValueCollection>) -> Self {
        Self { inner, cache }
    }

    /// Registry snapshots and past months never change once published; the
    /// current month's daily reports grow every business day.
    fn ttl_for(key: &SnapshotKey) -> Option<Duration> {
        match key {
            SnapshotKey::Registry(_) => None,
            SnapshotKey::DailyReport(month) if *month >= YearMonth::current() => {
                let ttl_seconds = match seconds_until(REFRESH_HOUR_UTC, 0) {
                    Ok(ttl) => ttl,
                    Err(e) => {
                        warn!(
                            "Failed calculating {}AM UTC refresh TTL: {}. Using fallback 1 day",
                            REFRESH_HOUR_UTC, e
                        );
                        24 * 60 * 60
                    }
                };
                Some(Duration::from_secs(ttl_seconds))
            }
            SnapshotKey::DailyReport(_) => None,
        }
    }
}

#[async_trait]
impl<T: SnapshotFetcher> SnapshotFetcher for CachingFetcher<T> {
    async fn fetch(&self, key: &SnapshotKey) -> Result<FetchOutcome> {
        let cache_key = key.file_name();
        if let Some(data) = self.cache.get(cache_key.as_bytes()).await {
            debug!("Cache hit for snapshot: {}", key);
            return Ok(FetchOutcome::Found(Snapshot::new(*key, data)));
        }
        debug!("Cache miss for snapshot: {}", key);

        let outcome = self.inner.fetch(key).await?;
        if let FetchOutcome::Found(snapshot) = &outcome {
            self.cache
                .put(cache_key.as_bytes(), &snapshot.data, Self::ttl_for(key))
                .await;
        }
        Ok(outcome)
    }
}
