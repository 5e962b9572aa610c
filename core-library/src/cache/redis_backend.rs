//! Redis cache backend

use super::CacheBackend;
use crate::error::{LibraryError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{info, warn};

/// [`CacheBackend`] over a multiplexed, auto-reconnecting Redis connection.
///
/// Entries are written without expiry.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Connect to `url` (e.g. `redis://:password@localhost:6379/0`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            warn!(error = %e, "Invalid Redis URL");
            LibraryError::cache("redis.open", e)
        })?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            warn!(error = %e, "Failed to connect to Redis");
            LibraryError::cache("redis.connect", e)
        })?;

        info!("Connected to Redis");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| LibraryError::cache("redis.get", e))?;
        Ok(value)
    }

    async fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.cmd("SET").arg(key).arg(value.as_slice()).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| LibraryError::cache("redis.set", e))?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| LibraryError::cache("redis.del", e))?;
        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| LibraryError::cache("redis.ping", e))?;
        Ok(())
    }
}
