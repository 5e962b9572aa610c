//! Core service façade and bootstrap helpers.
//!
//! [`SongService`] is the application layer used by delivery adapters.
//! [`bootstrap`] wires it from an [`AppConfig`]: SQLite pool and migrations,
//! Redis-backed song cache, cache-coherent repository and the music info
//! client.

pub mod error;
pub mod song_service;

pub use error::{CoreError, Result, ServiceErrorKind};
pub use song_service::{merge_song, split_verses, SongService, SongUpdate};

use core_library::cache::{KeyValueSongCache, RedisBackend};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{CacheBackend, CachedSongRepository, RequestContext, SqliteSongStore};
use core_metadata::{MusicInfoClient, MusicInfoConfig};
use core_runtime::config::AppConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// A running core: the service plus the resources to release on shutdown.
pub struct Core {
    pub service: SongService,
    pool: SqlitePool,
}

impl Core {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database pool, waiting for checked-out connections.
    pub async fn shutdown(self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

/// Connect every backend named in `config` and assemble the service.
///
/// When `redis.recover_on_start` is set the cache is rebuilt from the
/// database before returning.
pub async fn bootstrap(config: &AppConfig) -> Result<Core> {
    let pool = create_pool(
        DatabaseConfig::new(config.database.url.clone())
            .max_connections(config.database.max_connections)
            .acquire_timeout(config.database.acquire_timeout()),
    )
    .await?;

    let backend = RedisBackend::connect(&config.redis.url).await?;
    backend.ping().await?;

    let store = Arc::new(SqliteSongStore::new(pool.clone()));
    let cache = Arc::new(KeyValueSongCache::new(backend));
    let repository = Arc::new(CachedSongRepository::new(store, cache));

    let metadata = MusicInfoClient::new(
        MusicInfoConfig::new(config.music_info.base_url.clone())
            .timeout(config.music_info.timeout()),
    )
    .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

    let service = SongService::new(repository, Arc::new(metadata));

    if config.redis.recover_on_start {
        let recovered = service.recover_cache(&RequestContext::background()).await?;
        info!(recovered, "Song cache rebuilt from database");
    }

    Ok(Core { service, pool })
}
