use crate::core::cache::KeyValueCollection;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

/// Process-local collection, used when no disk cache is available.
#[derive(Default)]
pub struct MemoryCollection {
    entries: Mutex<HashMap<Vec<u8>, Entry>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().await;
        let expired = entries
            .get(key)?
            .expires_at
            .is_some_and(|at| at <= Instant::now());
        if expired {
            debug!(key = %String::from_utf8_lossy(key), "Cache entry expired");
            entries.remove(key);
            return None;
        }
        debug!(key = %String::from_utf8_lossy(key), "Cache HIT");
        entries.get(key).map(|e| e.value.clone())
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) {
        let entry = Entry {
            value: value.to_vec(),
            expires_at: ttl.map(|d| Instant::now() + d),
        };
        self.entries.lock().await.insert(key.to_vec(), entry);
        debug!(key = %String::from_utf8_lossy(key), bytes = value.len(), "Cache PUT");
    }

    async fn remove(&self, key: &[u8]) {
        self.entries.lock().await.remove(key);
    }

    async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
