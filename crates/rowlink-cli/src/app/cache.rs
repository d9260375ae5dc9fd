//! Cache backends for resolved links.
//!
//! [`AppCache`] is what the pipeline sees: either the in-process
//! [`MemoryCache`] from the library or a [`RedisCache`] shared between runs
//! and machines. Redis entries carry no expiry; the remote cache is treated
//! as a durable map that external tooling may prune.

use anyhow::Context;
use core::convert::Infallible;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use rowlink::{Cache, MemoryCache};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis command failed: {0}")]
    Redis(#[from] redis::RedisError),
}

impl From<Infallible> for CacheError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Thin [`Cache`] over a multiplexed async Redis connection.
pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    /// Connects to `redis://{addr}/{db}` and verifies the server answers a
    /// `PING`, so a misconfigured cache fails at startup rather than on the
    /// first record.
    pub async fn connect(addr: &str, db: i64) -> anyhow::Result<Self> {
        let url = format!("redis://{addr}/{db}");
        let client = redis::Client::open(url).with_context(|| format!("invalid redis address {addr:?}"))?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .with_context(|| format!("failed to connect to redis at {addr:?}"))?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .with_context(|| format!("redis at {addr:?} did not answer PING"))?;
        Ok(Self { conn })
    }
}

impl Cache for RedisCache {
    type Error = redis::RedisError;

    async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.set(key, value).await
    }
}

/// The cache backend selected at startup.
pub enum AppCache {
    Memory(MemoryCache),
    Redis(RedisCache),
}

impl AppCache {
    pub fn memory() -> Self {
        Self::Memory(MemoryCache::new())
    }

    pub async fn redis(addr: &str, db: i64) -> anyhow::Result<Self> {
        Ok(Self::Redis(RedisCache::connect(addr, db).await?))
    }
}

impl Cache for AppCache {
    type Error = CacheError;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self {
            Self::Memory(cache) => Ok(cache.get(key).await?),
            Self::Redis(cache) => Ok(cache.get(key).await?),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        match self {
            Self::Memory(cache) => Ok(cache.set(key, value).await?),
            Self::Redis(cache) => Ok(cache.set(key, value).await?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_round_trips() {
        let cache = AppCache::memory();
        cache.set("rowlink:k", "v").await.unwrap();
        assert_eq!(cache.get("rowlink:k").await.unwrap(), Some("v".to_string()));
        assert_eq!(cache.get("rowlink:missing").await.unwrap(), None);
    }
}
