use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, types::cache_entry::CacheEntry},
    utils::config::AppConfig,
};

/// Logical partitions of the durable cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheArea {
    /// Uploaded remote file ids, keyed by provider and content hash.
    Uploads,
    /// Vector store ids and their attached files, keyed by provider and course.
    VectorStores,
}

impl CacheArea {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploads => "uploads",
            Self::VectorStores => "vector_stores",
        }
    }
}

impl fmt::Display for CacheArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub uploads: Duration,
    pub vector_stores: Duration,
}

impl CacheTtl {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            uploads: Duration::from_secs(config.upload_cache_ttl_secs),
            vector_stores: Duration::from_secs(config.vector_store_cache_ttl_secs),
        }
    }

    pub fn for_area(&self, area: CacheArea) -> Duration {
        match area {
            CacheArea::Uploads => self.uploads,
            CacheArea::VectorStores => self.vector_stores,
        }
    }
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Keyed, TTL-bearing persistent store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `None` for missing or expired keys.
    async fn get(&self, area: CacheArea, key: &str) -> Result<Option<Value>, AppError>;

    async fn set(&self, area: CacheArea, key: &str, value: Value) -> Result<(), AppError>;
}

pub type DynCache = Arc<dyn CacheStore>;

/// Reads a value and deserializes it, treating undecodable values as a miss.
pub async fn get_typed<T>(
    cache: &dyn CacheStore,
    area: CacheArea,
    key: &str,
) -> Result<Option<T>, AppError>
where
    T: DeserializeOwned,
{
    let Some(value) = cache.get(area, key).await? else {
        return Ok(None);
    };

    match serde_json::from_value(value) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(err) => {
            debug!(%area, key, error = %err, "ignoring undecodable cache value");
            Ok(None)
        }
    }
}

pub async fn set_typed<T>(
    cache: &dyn CacheStore,
    area: CacheArea,
    key: &str,
    value: &T,
) -> Result<(), AppError>
where
    T: Serialize + Sync,
{
    let value = serde_json::to_value(value)?;
    cache.set(area, key, value).await
}

/// Process-local cache, used for tests and the `memory` backend.
#[derive(Default)]
pub struct MemoryCache {
    ttl: CacheTtl,
    entries: Mutex<HashMap<(CacheArea, String), (Value, Instant)>>,
}

impl MemoryCache {
    pub fn new(ttl: CacheTtl) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, area: CacheArea, key: &str) -> Result<Option<Value>, AppError> {
        let mut entries = self.entries.lock().await;
        let lookup = (area, key.to_string());
        match entries.get(&lookup) {
            Some((_, expires_at)) if Instant::now() >= *expires_at => {
                entries.remove(&lookup);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, area: CacheArea, key: &str, value: Value) -> Result<(), AppError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(self.ttl.for_area(area))
            .or_else(|| now.checked_add(Duration::from_secs(u64::from(u32::MAX))))
            .unwrap_or(now);
        self.entries
            .lock()
            .await
            .insert((area, key.to_string()), (value, expires_at));
        Ok(())
    }
}

/// Cache persisted as `cache_entry` records in SurrealDB.
#[derive(Clone)]
pub struct SurrealCache {
    db: Arc<SurrealDbClient>,
    ttl: CacheTtl,
}

impl SurrealCache {
    pub fn new(db: Arc<SurrealDbClient>, ttl: CacheTtl) -> Self {
        Self { db, ttl }
    }
}

#[async_trait]
impl CacheStore for SurrealCache {
    async fn get(&self, area: CacheArea, key: &str) -> Result<Option<Value>, AppError> {
        let id = CacheEntry::record_id(area.as_str(), key);
        let Some(entry) = self.db.get_item::<CacheEntry>(&id).await? else {
            return Ok(None);
        };

        if entry.is_expired(Utc::now()) {
            debug!(%area, key, "cache entry expired");
            let _deleted: Option<CacheEntry> = self.db.delete_item(&id).await?;
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&entry.payload)?))
    }

    async fn set(&self, area: CacheArea, key: &str, value: Value) -> Result<(), AppError> {
        let ttl_secs = self.ttl.for_area(area).as_secs();
        let entry = CacheEntry::new(area.as_str(), key, serde_json::to_string(&value)?, ttl_secs);
        self.db.upsert_item(entry).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use uuid::Uuid;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        id: String,
        count: u32,
    }

    async fn surreal_cache(ttl: CacheTtl) -> SurrealCache {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("test_ns", &database)
            .await
            .expect("Failed to start in-memory surrealdb");
        SurrealCache::new(Arc::new(db), ttl)
    }

    #[tokio::test]
    async fn memory_cache_separates_areas() {
        let cache = MemoryCache::default();
        cache
            .set(CacheArea::Uploads, "openai_1", json!("upload"))
            .await
            .expect("set");
        cache
            .set(CacheArea::VectorStores, "openai_1", json!("store"))
            .await
            .expect("set");

        assert_eq!(
            cache.get(CacheArea::Uploads, "openai_1").await.expect("get"),
            Some(json!("upload"))
        );
        assert_eq!(
            cache
                .get(CacheArea::VectorStores, "openai_1")
                .await
                .expect("get"),
            Some(json!("store"))
        );
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn memory_cache_expires_entries() {
        let cache = MemoryCache::new(CacheTtl {
            uploads: Duration::ZERO,
            vector_stores: Duration::from_secs(60),
        });
        cache
            .set(CacheArea::Uploads, "k", json!(1))
            .await
            .expect("set");
        cache
            .set(CacheArea::VectorStores, "k", json!(2))
            .await
            .expect("set");

        assert_eq!(cache.get(CacheArea::Uploads, "k").await.expect("get"), None);
        assert_eq!(
            cache.get(CacheArea::VectorStores, "k").await.expect("get"),
            Some(json!(2))
        );
    }

    #[tokio::test]
    async fn typed_helpers_round_trip_and_ignore_garbage() {
        let cache = MemoryCache::default();
        let sample = Sample {
            id: "file-1".into(),
            count: 3,
        };
        set_typed(&cache, CacheArea::Uploads, "good", &sample)
            .await
            .expect("set typed");
        cache
            .set(CacheArea::Uploads, "bad", json!({"unexpected": true}))
            .await
            .expect("set raw");

        let good: Option<Sample> = get_typed(&cache, CacheArea::Uploads, "good")
            .await
            .expect("get typed");
        let bad: Option<Sample> = get_typed(&cache, CacheArea::Uploads, "bad")
            .await
            .expect("get typed");
        let missing: Option<Sample> = get_typed(&cache, CacheArea::Uploads, "missing")
            .await
            .expect("get typed");

        assert_eq!(good, Some(sample));
        assert_eq!(bad, None);
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn surreal_cache_persists_and_overwrites() {
        let cache = surreal_cache(CacheTtl::default()).await;

        cache
            .set(CacheArea::VectorStores, "openai_7", json!({"id": "vs_1"}))
            .await
            .expect("set");
        cache
            .set(CacheArea::VectorStores, "openai_7", json!({"id": "vs_2"}))
            .await
            .expect("overwrite");

        assert_eq!(
            cache
                .get(CacheArea::VectorStores, "openai_7")
                .await
                .expect("get"),
            Some(json!({"id": "vs_2"}))
        );
        assert_eq!(
            cache.get(CacheArea::Uploads, "openai_7").await.expect("get"),
            None
        );
    }

    #[tokio::test]
    async fn surreal_cache_drops_expired_entries() {
        let cache = surreal_cache(CacheTtl {
            uploads: Duration::ZERO,
            vector_stores: Duration::ZERO,
        })
        .await;

        cache
            .set(CacheArea::Uploads, "openai_abc", json!("file-1"))
            .await
            .expect("set");

        assert_eq!(
            cache.get(CacheArea::Uploads, "openai_abc").await.expect("get"),
            None
        );
    }
}
