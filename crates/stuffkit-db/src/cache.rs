//! Model cache abstraction
//!
//! The model helpers store serialized documents under `"{table}::{id}"` keys.
//! Values are JSON strings so the same entries can live in process memory or
//! in a Redis instance shared by several services.

use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;

use crate::error::DbResult;

const DEFAULT_TTL_SECS: u64 = 300;
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Key/value store backing cache-aside reads
#[async_trait]
pub trait ModelCache: Send + Sync {
    /// Raw cached value for `key`, if present
    async fn get_raw(&self, key: &str) -> DbResult<Option<String>>;

    async fn set_raw(&self, key: &str, value: String) -> DbResult<()>;

    async fn delete(&self, key: &str) -> DbResult<()>;
}

/// In-process cache with TTL expiration
#[derive(Clone)]
pub struct MemoryCache {
    cache: Cache<String, String>,
}

impl MemoryCache {
    /// # Parameters
    /// * `ttl` - Time-to-live for every entry
    /// * `max_capacity` - Maximum number of entries kept
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(max_capacity)
            .build();
        Self { cache }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS), DEFAULT_MAX_CAPACITY)
    }
}

#[async_trait]
impl ModelCache for MemoryCache {
    async fn get_raw(&self, key: &str) -> DbResult<Option<String>> {
        Ok(self.cache.get(key).await)
    }

    async fn set_raw(&self, key: &str, value: String) -> DbResult<()> {
        self.cache.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> DbResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}

/// Redis-backed cache; entries expire after `ttl`
#[cfg(feature = "redis")]
#[derive(Clone)]
pub struct RedisCache {
    client: crate::redis::RedisClient,
    ttl: Duration,
}

#[cfg(feature = "redis")]
impl RedisCache {
    pub fn new(client: crate::redis::RedisClient, ttl: Duration) -> Self {
        Self { client, ttl }
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl ModelCache for RedisCache {
    async fn get_raw(&self, key: &str) -> DbResult<Option<String>> {
        self.client.get(key).await
    }

    async fn set_raw(&self, key: &str, value: String) -> DbResult<()> {
        self.client.set_ex(key, &value, self.ttl).await
    }

    async fn delete(&self, key: &str) -> DbResult<()> {
        self.client.del(key).await.map(|_| ())
    }
}
