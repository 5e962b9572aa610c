//! # Song Cache
//!
//! Key-value mirror of stored songs.
//!
//! ## Key scheme
//!
//! - `song:{id}` holds the JSON-encoded record. This is the only copy.
//! - `song:name:{len(group)}:{group}:{name}` holds the id of the song with that
//!   name and group, so name+group lookups can be answered from the cache.
//!
//! A pointer whose target record is missing, or whose record no longer has that
//! name and group, is a miss. Undecodable records or pointers are integrity
//! errors on reads, never misses. Writes and invalidations drop them instead,
//! since they are about to be replaced or removed. Entries have no expiry.
//!
//! ## Backends
//!
//! [`KeyValueSongCache`] holds the encoding and key logic and runs over any
//! [`CacheBackend`]: [`RedisBackend`] in production and [`InMemoryBackend`]
//! in tests.

mod memory;
mod redis_backend;

pub use memory::InMemoryBackend;
pub use redis_backend::RedisBackend;

use crate::context::RequestContext;
use crate::error::{ErrorKind, LibraryError, Result};
use crate::models::{Song, SongLookup, SongSearch};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Raw byte-level cache operations
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Value stored under `key`, `None` when absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store every entry atomically, overwriting existing values
    async fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()>;

    /// Remove `keys`, returning how many existed
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
}

/// Song cache interface used by the repository
#[async_trait]
pub trait SongCache: Send + Sync {
    /// Store `song` under its identity, overwriting any previous entry.
    ///
    /// # Errors
    /// - `InvalidKey` if the song has no id yet
    async fn set(&self, ctx: &RequestContext, song: &Song) -> Result<()>;

    /// Cached song for `key`, `NotFound` on a miss
    async fn get(&self, ctx: &RequestContext, key: &SongSearch) -> Result<Song>;

    /// Drop the entry for `key`. Already-absent entries are not an error.
    async fn invalidate(&self, ctx: &RequestContext, key: &SongSearch) -> Result<()>;
}

/// Wire form of a cached song
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedSong {
    id: Uuid,
    name: String,
    group: String,
    text: String,
    link: Option<String>,
    release_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Song> for CachedSong {
    fn from(song: &Song) -> Self {
        Self {
            id: song.id,
            name: song.name.clone(),
            group: song.group.clone(),
            text: song.text.clone(),
            link: song.link.clone(),
            release_date: song.release_date,
            created_at: song.created_at,
            updated_at: song.updated_at,
        }
    }
}

impl From<CachedSong> for Song {
    fn from(cached: CachedSong) -> Self {
        Self {
            id: cached.id,
            name: cached.name,
            group: cached.group,
            text: cached.text,
            link: cached.link,
            release_date: cached.release_date,
            created_at: cached.created_at,
            updated_at: cached.updated_at,
        }
    }
}

pub(crate) fn record_key(id: Uuid) -> String {
    format!("song:{}", id)
}

pub(crate) fn name_key(name: &str, group: &str) -> String {
    format!("song:name:{}:{}:{}", group.len(), group, name)
}

/// [`SongCache`] over a [`CacheBackend`]
pub struct KeyValueSongCache<B> {
    backend: B,
}

impl<B: CacheBackend> KeyValueSongCache<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn load_record(&self, op: &'static str, id: Uuid) -> Result<Option<Song>> {
        let Some(bytes) = self.backend.get(&record_key(id)).await? else {
            return Ok(None);
        };

        let cached: CachedSong =
            serde_json::from_slice(&bytes).map_err(|e| LibraryError::Integrity {
                op,
                message: format!("record {}: {}", id, e),
            })?;
        if cached.id != id {
            return Err(LibraryError::Integrity {
                op,
                message: format!("record {} holds song {}", id, cached.id),
            });
        }
        Ok(Some(cached.into()))
    }

    /// Record about to be overwritten or removed; a corrupted one reads as absent
    async fn previous_record(&self, op: &'static str, id: Uuid) -> Result<Option<Song>> {
        match self.load_record(op, id).await {
            Err(e) if e.kind() == ErrorKind::Integrity => {
                warn!(song_id = %id, error = %e, "Dropping corrupted cache record");
                Ok(None)
            }
            other => other,
        }
    }

    /// Whether the pointer for `name` and `group` goes away together with song `id`.
    ///
    /// Pointers to another song stay. Unreadable pointers go.
    async fn pointer_owned_by(&self, op: &'static str, id: Uuid, name: &str, group: &str) -> Result<bool> {
        match self.resolve_name(op, name, group).await {
            Ok(target) => Ok(target == Some(id)),
            Err(e) if e.kind() == ErrorKind::Integrity => Ok(true),
            Err(e) => Err(e),
        }
    }

    async fn resolve_name(&self, op: &'static str, name: &str, group: &str) -> Result<Option<Uuid>> {
        let Some(bytes) = self.backend.get(&name_key(name, group)).await? else {
            return Ok(None);
        };

        let id = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| LibraryError::Integrity {
                op,
                message: format!("name pointer for {} - {} is not an id", group, name),
            })?;
        Ok(Some(id))
    }
}

#[async_trait]
impl<B: CacheBackend> SongCache for KeyValueSongCache<B> {
    #[instrument(skip(self, ctx, song), fields(song_id = %song.id))]
    async fn set(&self, ctx: &RequestContext, song: &Song) -> Result<()> {
        const OP: &str = "song_cache.set";
        if song.id.is_nil() {
            return Err(LibraryError::InvalidKey(format!(
                "cannot cache unpersisted song {} - {}",
                song.group, song.name
            )));
        }

        let payload = serde_json::to_vec(&CachedSong::from(song))
            .map_err(|e| LibraryError::cache(OP, e))?;
        let entries = [
            (record_key(song.id), payload),
            (name_key(&song.name, &song.group), song.id.to_string().into_bytes()),
        ];

        ctx.run(OP, async {
            let mut orphaned = Vec::new();
            if let Some(previous) = self.previous_record(OP, song.id).await? {
                let renamed = previous.name != song.name || previous.group != song.group;
                if renamed
                    && self
                        .pointer_owned_by(OP, song.id, &previous.name, &previous.group)
                        .await?
                {
                    orphaned.push(name_key(&previous.name, &previous.group));
                }
            }

            self.backend.set_many(&entries).await?;
            if !orphaned.is_empty() {
                self.backend.delete(&orphaned).await?;
            }
            Ok(())
        })
        .await?;
        debug!("Song cached");
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(key = %key))]
    async fn get(&self, ctx: &RequestContext, key: &SongSearch) -> Result<Song> {
        const OP: &str = "song_cache.get";
        let lookup = key.lookup()?;
        let found = ctx
            .run(OP, async {
                match lookup {
                    SongLookup::Id(id) => self.load_record(OP, id).await,
                    SongLookup::NameGroup { name, group } => {
                        let Some(id) = self.resolve_name(OP, name, group).await? else {
                            return Ok(None);
                        };
                        let song = self.load_record(OP, id).await?;
                        Ok(song.filter(|s| s.name == name && s.group == group))
                    }
                }
            })
            .await?;

        match found {
            Some(song) => {
                debug!("Cache hit");
                Ok(song)
            }
            None => {
                debug!("Cache miss");
                Err(LibraryError::not_found("cached song", key))
            }
        }
    }

    #[instrument(skip(self, ctx), fields(key = %key))]
    async fn invalidate(&self, ctx: &RequestContext, key: &SongSearch) -> Result<()> {
        const OP: &str = "song_cache.invalidate";
        let lookup = key.lookup()?;
        ctx.run(OP, async {
            let mut keys = Vec::with_capacity(3);
            let id = match lookup {
                SongLookup::Id(id) => Some(id),
                SongLookup::NameGroup { name, group } => {
                    keys.push(name_key(name, group));
                    self.resolve_name(OP, name, group).await?
                }
            };

            if let Some(id) = id {
                keys.push(record_key(id));

                // Pointers to this song can sit under the name the key carries
                // and under the name of the cached record.
                let mut names = Vec::with_capacity(2);
                if !key.name.is_empty() && !key.group.is_empty() {
                    names.push((key.name.clone(), key.group.clone()));
                }
                if let Some(song) = self.previous_record(OP, id).await? {
                    names.push((song.name, song.group));
                }
                for (name, group) in names {
                    let pointer = name_key(&name, &group);
                    if !keys.contains(&pointer) && self.pointer_owned_by(OP, id, &name, &group).await? {
                        keys.push(pointer);
                    }
                }
            }

            let removed = self.backend.delete(&keys).await?;
            debug!(removed, "Cache entry invalidated");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn cache() -> KeyValueSongCache<InMemoryBackend> {
        KeyValueSongCache::new(InMemoryBackend::new())
    }

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    fn stored_song(name: &str, group: &str) -> Song {
        let now = Utc::now();
        Song {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            ..Song::new(name, group).with_text("la la la")
        }
    }

    #[tokio::test]
    async fn test_set_then_get_by_id_and_name() {
        let cache = cache();
        let song = stored_song("Hysteria", "Muse");
        cache.set(&ctx(), &song).await.unwrap();

        assert_eq!(cache.get(&ctx(), &song.key()).await.unwrap(), song);
        assert_eq!(
            cache
                .get(&ctx(), &SongSearch::by_name("Hysteria", "Muse"))
                .await
                .unwrap(),
            song
        );
    }

    #[tokio::test]
    async fn test_get_absent_is_not_found() {
        let cache = cache();
        let err = cache
            .get(&ctx(), &SongSearch::by_id(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_set_unpersisted_song_is_rejected() {
        let cache = cache();
        let err = cache
            .set(&ctx(), &Song::new("Hysteria", "Muse"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidKey);
        assert!(cache.backend().is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_integrity_error() {
        let cache = cache();
        let id = Uuid::new_v4();
        cache.backend().insert_raw(record_key(id), "{not json").await;

        let err = cache.get(&ctx(), &SongSearch::by_id(id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[tokio::test]
    async fn test_malformed_name_pointer_is_integrity_error() {
        let cache = cache();
        cache
            .backend()
            .insert_raw(name_key("Hysteria", "Muse"), "garbage")
            .await;

        let err = cache
            .get(&ctx(), &SongSearch::by_name("Hysteria", "Muse"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[tokio::test]
    async fn test_stale_name_pointer_is_a_miss() {
        let cache = cache();
        let mut song = stored_song("Hysteria", "Muse");
        cache.set(&ctx(), &song).await.unwrap();

        song.name = "Hysteria (Remastered)".to_string();
        cache.set(&ctx(), &song).await.unwrap();

        let err = cache
            .get(&ctx(), &SongSearch::by_name("Hysteria", "Muse"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            cache
                .get(&ctx(), &SongSearch::by_name("Hysteria (Remastered)", "Muse"))
                .await
                .unwrap(),
            song
        );
    }

    #[tokio::test]
    async fn test_rename_drops_old_pointer() {
        let cache = cache();
        let mut song = stored_song("Hysteria", "Muse");
        cache.set(&ctx(), &song).await.unwrap();

        song.name = "Hysteria (Remastered)".to_string();
        cache.set(&ctx(), &song).await.unwrap();

        assert!(!cache.backend().contains_key(&name_key("Hysteria", "Muse")).await);
        assert_eq!(cache.backend().len().await, 2);
    }

    #[tokio::test]
    async fn test_rename_keeps_pointer_claimed_by_another_song() {
        let cache = cache();
        let mut first = stored_song("Hysteria", "Muse");
        cache.set(&ctx(), &first).await.unwrap();
        let second = stored_song("Hysteria", "Muse");
        cache.set(&ctx(), &second).await.unwrap();

        first.name = "Starlight".to_string();
        cache.set(&ctx(), &first).await.unwrap();

        assert_eq!(
            cache
                .get(&ctx(), &SongSearch::by_name("Hysteria", "Muse"))
                .await
                .unwrap(),
            second
        );
    }

    #[tokio::test]
    async fn test_set_overwrites_corrupted_record() {
        let cache = cache();
        let song = stored_song("Hysteria", "Muse");
        cache.backend().insert_raw(record_key(song.id), "{not json").await;

        cache.set(&ctx(), &song).await.unwrap();
        assert_eq!(cache.get(&ctx(), &song.key()).await.unwrap(), song);
    }

    #[tokio::test]
    async fn test_invalidate_by_id_removes_record_and_pointer() {
        let cache = cache();
        let song = stored_song("Hysteria", "Muse");
        cache.set(&ctx(), &song).await.unwrap();

        cache.invalidate(&ctx(), &song.key()).await.unwrap();

        assert!(cache.backend().is_empty().await);
        assert!(cache.get(&ctx(), &song.key()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_invalidate_by_name_removes_record_and_pointer() {
        let cache = cache();
        let song = stored_song("Hysteria", "Muse");
        cache.set(&ctx(), &song).await.unwrap();

        cache
            .invalidate(&ctx(), &SongSearch::by_name("Hysteria", "Muse"))
            .await
            .unwrap();

        assert!(cache.backend().is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate_absent_key_succeeds() {
        let cache = cache();
        cache
            .invalidate(&ctx(), &SongSearch::by_id(Uuid::new_v4()))
            .await
            .unwrap();
        cache
            .invalidate(&ctx(), &SongSearch::by_name("Nope", "Nobody"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_removes_corrupted_record() {
        let cache = cache();
        let id = Uuid::new_v4();
        cache.backend().insert_raw(record_key(id), "\u{0}").await;

        cache.invalidate(&ctx(), &SongSearch::by_id(id)).await.unwrap();
        assert!(!cache.backend().contains_key(&record_key(id)).await);
    }

    #[tokio::test]
    async fn test_invalidate_by_name_with_corrupted_pointer_is_integrity_error() {
        let cache = cache();
        let song = stored_song("Hysteria", "Muse");
        cache.set(&ctx(), &song).await.unwrap();
        cache
            .backend()
            .insert_raw(name_key("Hysteria", "Muse"), "garbage")
            .await;

        let err = cache
            .invalidate(&ctx(), &SongSearch::by_name("Hysteria", "Muse"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(cache.backend().contains_key(&record_key(song.id)).await);
    }

    #[tokio::test]
    async fn test_invalidate_full_key_drops_corrupted_pointer() {
        let cache = cache();
        let song = stored_song("Hysteria", "Muse");
        cache.set(&ctx(), &song).await.unwrap();
        cache
            .backend()
            .insert_raw(name_key("Hysteria", "Muse"), "garbage")
            .await;

        cache.invalidate(&ctx(), &song.key()).await.unwrap();
        assert!(cache.backend().is_empty().await);
    }

    #[tokio::test]
    async fn test_name_key_is_unambiguous() {
        assert_ne!(name_key("b:c", "a"), name_key("c", "a:b"));
    }
}
