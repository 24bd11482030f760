use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache miss: {0}")]
    CacheMiss(String),
}

/// Two-tier cache for the shelter directory
///
/// L1 is a per-process moka cache. L2 is an optional Redis instance shared
/// across replicas. Without Redis the cache is process-local and entries of
/// other replicas only expire through the TTL.
pub struct DirectoryCache {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    generation: AtomicU64,
}

impl DirectoryCache {
    /// Create a cache, connecting to Redis when a URL is given
    pub async fn new(redis_url: Option<&str>, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let redis = match redis_url {
            Some(url) => {
                let client = redis::Client::open(url)?;
                let manager = redis::aio::ConnectionManager::new(client).await?;
                Some(Arc::new(tokio::sync::Mutex::new(manager)))
            }
            None => None,
        };

        Ok(Self::build(redis, l1_size, ttl_secs))
    }

    /// Process-local cache without an L2 tier
    pub fn local(l1_size: u64, ttl_secs: u64) -> Self {
        Self::build(None, l1_size, ttl_secs)
    }

    fn build(
        redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
        l1_size: u64,
        ttl_secs: u64,
    ) -> Self {
        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            redis,
            l1_cache,
            ttl_secs,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn has_shared_tier(&self) -> bool {
        self.redis.is_some()
    }

    /// Get a value from cache (L1 first, then L2)
    pub async fn get<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(serde_json::from_slice(&bytes)?);
        }

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
            drop(conn);

            if let Some(json) = value {
                tracing::trace!("L2 cache hit: {}", key);
                self.hits.fetch_add(1, Ordering::Relaxed);

                let parsed = serde_json::from_str(&json)?;
                self.l1_cache.insert(key.to_string(), json.into_bytes()).await;
                return Ok(parsed);
            }
        }

        tracing::trace!("Cache miss: {}", key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        Err(CacheError::CacheMiss(key.to_string()))
    }

    /// Set a value in both tiers
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;
        self.l1_cache.insert(key.to_string(), json.as_bytes().to_vec()).await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("SETEX")
                .arg(key)
                .arg(self.ttl_secs)
                .arg(json)
                .query_async::<()>(&mut *conn)
                .await?;
        }

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Invalidation counter, bumped before every shelter invalidation.
    ///
    /// Read it before loading from the store and pass it to
    /// [`DirectoryCache::set_if_current`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Store a value loaded while `generation` was current.
    ///
    /// If an invalidation ran after that read the value may predate it, so
    /// the key is dropped again instead of being left stale until the TTL.
    pub async fn set_if_current<T>(&self, key: &str, value: &T, generation: u64) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        if self.generation() != generation {
            tracing::trace!("Skipping stale cache set: {}", key);
            return Ok(());
        }

        self.set(key, value).await?;

        if self.generation() != generation {
            tracing::trace!("Invalidated during cache set: {}", key);
            self.delete(&[key.to_string()]).await?;
        }
        Ok(())
    }

    /// Delete keys from both tiers
    pub async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            self.l1_cache.invalidate(key).await;
        }

        if let Some(redis) = &self.redis {
            if !keys.is_empty() {
                let mut conn = redis.lock().await;
                redis::cmd("DEL").arg(keys).query_async::<()>(&mut *conn).await?;
            }
        }
        Ok(())
    }

    /// Drop the directory snapshot and the entry for one shelter
    pub async fn invalidate_shelter(&self, shelter_id: Uuid) -> Result<(), CacheError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.delete(&[CacheKey::directory(), CacheKey::shelter(shelter_id)]).await?;
        tracing::debug!("Invalidated cache for shelter {}", shelter_id);
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        CacheStats {
            l1_size: self.l1_cache.entry_count(),
            hit_count: hits,
            miss_count: misses,
            hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub l1_size: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Key for the full shelter snapshot
    pub fn directory() -> String {
        "shelters:directory".to_string()
    }

    /// Key for a single shelter
    pub fn shelter(id: Uuid) -> String {
        format!("shelter:{}", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_cache_set_get_with_redis() {
        let cache = DirectoryCache::new(Some("redis://127.0.0.1:6379"), 1000, 60)
            .await
            .expect("Failed to create cache");

        let key = "test_key";
        cache.set(key, &"test_value").await.unwrap();
        let result: String = cache.get(key).await.unwrap();
        assert_eq!(result, "test_value");

        cache.delete(&[key.to_string()]).await.unwrap();
        assert!(cache.get::<String>(key).await.is_err());
    }

    #[tokio::test]
    async fn test_local_cache_round_trip_and_stats() {
        let cache = DirectoryCache::local(100, 60);
        assert!(!cache.has_shared_tier());

        assert!(matches!(
            cache.get::<Vec<i32>>("missing").await,
            Err(CacheError::CacheMiss(_))
        ));

        cache.set("numbers", &vec![1, 2, 3]).await.unwrap();
        let numbers: Vec<i32> = cache.get("numbers").await.unwrap();
        assert_eq!(numbers, vec![1, 2, 3]);

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_invalidate_shelter_drops_snapshot() {
        let cache = DirectoryCache::local(100, 60);
        let id = Uuid::new_v4();

        cache.set(&CacheKey::directory(), &vec!["a"]).await.unwrap();
        cache.set(&CacheKey::shelter(id), &"a").await.unwrap();
        cache.invalidate_shelter(id).await.unwrap();

        assert!(cache.get::<Vec<String>>(&CacheKey::directory()).await.is_err());
        assert!(cache.get::<String>(&CacheKey::shelter(id)).await.is_err());
    }

    #[tokio::test]
    async fn test_set_if_current_skips_after_invalidation() {
        let cache = DirectoryCache::local(100, 60);
        let id = Uuid::new_v4();

        let before = cache.generation();
        cache.invalidate_shelter(id).await.unwrap();
        assert_ne!(cache.generation(), before);

        cache
            .set_if_current(&CacheKey::directory(), &vec!["old"], before)
            .await
            .unwrap();
        assert!(cache.get::<Vec<String>>(&CacheKey::directory()).await.is_err());

        cache
            .set_if_current(&CacheKey::directory(), &vec!["new"], cache.generation())
            .await
            .unwrap();
        let cached: Vec<String> = cache.get(&CacheKey::directory()).await.unwrap();
        assert_eq!(cached, vec!["new"]);
    }

    #[test]
    fn test_cache_key_builder() {
        let id = Uuid::nil();
        assert_eq!(CacheKey::directory(), "shelters:directory");
        assert_eq!(CacheKey::shelter(id), format!("shelter:{}", id));
    }
}
