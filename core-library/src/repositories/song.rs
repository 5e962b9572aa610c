//! Cache-coherent song repository
//!
//! [`CachedSongRepository`] puts a [`SongCache`] in front of a [`SongStore`]:
//!
//! - every mutation hits the store first and mirrors into the cache second
//! - reads try the cache and fill it from the store on a miss
//! - list queries go straight to the store
//!
//! There is no locking between the store write and the cache write, and no
//! retry. When the store write succeeds but the cache write fails the call
//! reports the cache error while the store change stays durable. A caller that
//! retries a create in that state gets `AlreadyExists` and should re-read.

use crate::cache::SongCache;
use crate::context::RequestContext;
use crate::error::{ErrorKind, Result};
use crate::models::{Song, SongFilter, SongSearch};
use crate::repositories::store::SongStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Repository surface used by the application service
#[async_trait]
pub trait SongRepository: Send + Sync {
    /// Persist `song` and cache the stored record
    async fn create(&self, ctx: &RequestContext, song: Song) -> Result<Song>;

    /// Read through the cache, filling it from the store on a miss
    async fn read(&self, ctx: &RequestContext, key: &SongSearch) -> Result<Song>;

    /// Fully replace the song at `key` and overwrite its cache entry.
    ///
    /// Field merging is the caller's job; `song` is written as given.
    async fn update(&self, ctx: &RequestContext, key: &SongSearch, song: Song) -> Result<Song>;

    /// Delete the song at `key` and invalidate the cache entries of the removed record
    async fn delete(&self, ctx: &RequestContext, key: &SongSearch) -> Result<()>;

    /// Filtered listing, newest first; `limit == 0` returns everything
    async fn read_all_with_filter(
        &self,
        ctx: &RequestContext,
        filter: &SongFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Song>>;

    async fn count_with_filter(&self, ctx: &RequestContext, filter: &SongFilter) -> Result<u64>;

    /// Write every stored song into the cache. Returns how many were written.
    ///
    /// Stops at the first cache error; entries written before it stay.
    async fn cache_recovery(&self, ctx: &RequestContext) -> Result<usize>;
}

pub struct CachedSongRepository {
    store: Arc<dyn SongStore>,
    cache: Arc<dyn SongCache>,
}

impl CachedSongRepository {
    pub fn new(store: Arc<dyn SongStore>, cache: Arc<dyn SongCache>) -> Self {
        Self { store, cache }
    }
}

#[async_trait]
impl SongRepository for CachedSongRepository {
    #[instrument(skip(self, ctx, song), fields(song_name = %song.name, group_name = %song.group))]
    async fn create(&self, ctx: &RequestContext, song: Song) -> Result<Song> {
        let song = self.store.create(ctx, song).await?;

        if let Err(e) = self.cache.set(ctx, &song).await {
            error!(song_id = %song.id, error = %e, "Song stored but not cached");
            return Err(e);
        }

        info!(song_id = %song.id, "Song created");
        Ok(song)
    }

    #[instrument(skip(self, ctx), fields(key = %key))]
    async fn read(&self, ctx: &RequestContext, key: &SongSearch) -> Result<Song> {
        match self.cache.get(ctx, key).await {
            Ok(song) => return Ok(song),
            Err(e) => match e.kind() {
                ErrorKind::NotFound => debug!("Cache miss, reading from store"),
                ErrorKind::Backend => warn!(error = %e, "Cache unavailable, reading from store"),
                _ => return Err(e),
            },
        }

        let song = self.store.read(ctx, key).await?;

        if let Err(e) = self.cache.set(ctx, &song).await {
            error!(song_id = %song.id, error = %e, "Failed to fill cache after miss");
            return Err(e);
        }

        Ok(song)
    }

    #[instrument(skip(self, ctx, song), fields(key = %key))]
    async fn update(&self, ctx: &RequestContext, key: &SongSearch, song: Song) -> Result<Song> {
        let song = self.store.update(ctx, key, song).await?;

        if let Err(e) = self.cache.set(ctx, &song).await {
            error!(song_id = %song.id, error = %e, "Song updated but cache not refreshed");
            return Err(e);
        }

        info!(song_id = %song.id, "Song updated");
        Ok(song)
    }

    #[instrument(skip(self, ctx), fields(key = %key))]
    async fn delete(&self, ctx: &RequestContext, key: &SongSearch) -> Result<()> {
        let deleted = self.store.delete(ctx, key).await?;

        if let Err(e) = self.cache.invalidate(ctx, &deleted.key()).await {
            error!(song_id = %deleted.id, error = %e, "Song deleted but cache entry not invalidated");
            return Err(e);
        }

        info!(song_id = %deleted.id, "Song deleted");
        Ok(())
    }

    async fn read_all_with_filter(
        &self,
        ctx: &RequestContext,
        filter: &SongFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Song>> {
        self.store.read_all_with_filter(ctx, filter, limit, offset).await
    }

    async fn count_with_filter(&self, ctx: &RequestContext, filter: &SongFilter) -> Result<u64> {
        self.store.count_with_filter(ctx, filter).await
    }

    #[instrument(skip(self, ctx))]
    async fn cache_recovery(&self, ctx: &RequestContext) -> Result<usize> {
        let songs = self
            .store
            .read_all_with_filter(ctx, &SongFilter::default(), 0, 0)
            .await?;
        info!(count = songs.len(), "Recovering song cache");

        for (written, song) in songs.iter().enumerate() {
            if let Err(e) = self.cache.set(ctx, song).await {
                error!(song_id = %song.id, written, error = %e, "Cache recovery aborted");
                return Err(e);
            }
        }

        info!(count = songs.len(), "Song cache recovered");
        Ok(songs.len())
    }
}
