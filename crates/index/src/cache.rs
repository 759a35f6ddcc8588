//! Key/value cache with per-entry expiry, used for computed statistics.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

pub type CacheHandle = Arc<dyn CacheStore + Send + Sync>;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The value stored under `key`, unless it has expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` for `ttl`, replacing any previous value.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Forget `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Process-local [`CacheStore`].
///
/// Expired entries are dropped lazily, when next read. A TTL too long to
/// represent as an [`Instant`] never expires.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Option<Instant>)>>,
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some((value, expires)) if expires.is_none_or(|expires| expires > now) => return Ok(Some(value.clone())),
                Some(_) => {},
            }
        }
        let mut entries = self.entries.write().await;
        // Re-check: another writer may have refreshed it in between.
        if entries.get(key).is_some_and(|(_, expires)| expires.is_some_and(|expires| expires <= now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let expires = Instant::now().checked_add(ttl);
        self.entries.write().await.insert(key.to_string(), (value, expires));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
