//! Song application service
//!
//! Sits on top of the [`SongRepository`] and adds what the repository does
//! not know about: enrichment from the music info service on add, field
//! merging on update, page-number listing and verse splitting.

use crate::error::{CoreError, Result};
use chrono::{NaiveDate, Utc};
use core_library::repositories::{Page, PageRequest};
use core_library::{RequestContext, Song, SongFilter, SongInfo, SongRepository, SongSearch};
use core_metadata::SongMetadataProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Partial update; `None` and empty strings keep the current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongUpdate {
    pub name: Option<String>,
    pub group: Option<String>,
    pub text: Option<String>,
    pub link: Option<String>,
    pub release_date: Option<NaiveDate>,
}

impl SongUpdate {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Overlay `update` on `current`.
///
/// Identity and `created_at` always come from `current`; `updated_at` is set
/// to now.
pub fn merge_song(current: &Song, update: SongUpdate) -> Song {
    Song {
        id: current.id,
        name: non_empty(update.name).unwrap_or_else(|| current.name.clone()),
        group: non_empty(update.group).unwrap_or_else(|| current.group.clone()),
        text: non_empty(update.text).unwrap_or_else(|| current.text.clone()),
        link: non_empty(update.link).or_else(|| current.link.clone()),
        release_date: update.release_date.or(current.release_date),
        created_at: current.created_at,
        updated_at: Utc::now(),
    }
}

/// Split lyrics into verses on blank lines.
///
/// Line endings are normalized, verses are trimmed, and empty verses from
/// runs of blank lines are dropped.
pub fn split_verses(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|verse| !verse.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Clone)]
pub struct SongService {
    repository: Arc<dyn SongRepository>,
    metadata: Arc<dyn SongMetadataProvider>,
}

impl SongService {
    pub fn new(
        repository: Arc<dyn SongRepository>,
        metadata: Arc<dyn SongMetadataProvider>,
    ) -> Self {
        Self {
            repository,
            metadata,
        }
    }

    /// Enrich `info` from the music info service and store the result.
    ///
    /// The repository is not touched when the lookup fails.
    #[instrument(skip(self, ctx, info), fields(song_name = %info.name, group_name = %info.group))]
    pub async fn add(&self, ctx: &RequestContext, info: &SongInfo) -> Result<Song> {
        if info.name.trim().is_empty() {
            return Err(CoreError::invalid_input("name", "must not be empty"));
        }
        if info.group.trim().is_empty() {
            return Err(CoreError::invalid_input("group", "must not be empty"));
        }

        let enriched = self.metadata.fetch(ctx, info).await.map_err(|e| {
            let err = CoreError::from(e);
            warn!(error = %err, "Song info lookup failed");
            err
        })?;
        debug!("Song info fetched");

        let song = self.repository.create(ctx, enriched).await?;
        info!(song_id = %song.id, "Song added");
        Ok(song)
    }

    pub async fn get(&self, ctx: &RequestContext, key: &SongSearch) -> Result<Song> {
        Ok(self.repository.read(ctx, key).await?)
    }

    /// Read the current song, merge `update` over it and write it back
    #[instrument(skip(self, ctx, update), fields(key = %key))]
    pub async fn update(
        &self,
        ctx: &RequestContext,
        key: &SongSearch,
        update: SongUpdate,
    ) -> Result<Song> {
        let current = self.repository.read(ctx, key).await?;
        let merged = merge_song(&current, update);

        let song = self
            .repository
            .update(ctx, &SongSearch::by_id(current.id), merged)
            .await?;
        info!(song_id = %song.id, "Song updated");
        Ok(song)
    }

    pub async fn delete(&self, ctx: &RequestContext, key: &SongSearch) -> Result<()> {
        self.repository.delete(ctx, key).await?;
        Ok(())
    }

    /// One page of songs matching `filter`, newest first
    #[instrument(skip(self, ctx))]
    pub async fn get_all_with_filter(
        &self,
        ctx: &RequestContext,
        filter: &SongFilter,
        page: PageRequest,
    ) -> Result<Page<Song>> {
        if page.page_size == 0 {
            return Err(CoreError::invalid_input("page_size", "must be greater than zero"));
        }

        let songs = self
            .repository
            .read_all_with_filter(ctx, filter, page.limit(), page.offset())
            .await?;
        let total = self.repository.count_with_filter(ctx, filter).await?;

        debug!(count = songs.len(), total, "Songs listed");
        Ok(Page::new(songs, total, page))
    }

    /// Every verse of the song's text
    ///
    /// # Errors
    /// - `EmptyText` when the song exists but has no text
    pub async fn get_paginated_text(
        &self,
        ctx: &RequestContext,
        key: &SongSearch,
    ) -> Result<Vec<String>> {
        let song = self.repository.read(ctx, key).await?;
        let verses = split_verses(&song.text);
        if verses.is_empty() {
            return Err(CoreError::EmptyText);
        }
        Ok(verses)
    }

    /// One page of the song's verses
    pub async fn get_text_page(
        &self,
        ctx: &RequestContext,
        key: &SongSearch,
        page: PageRequest,
    ) -> Result<Page<String>> {
        if page.page_size == 0 {
            return Err(CoreError::invalid_input("page_size", "must be greater than zero"));
        }

        let verses = self.get_paginated_text(ctx, key).await?;
        let total = verses.len() as u64;
        let items = verses
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(Page::new(items, total, page))
    }

    /// Rebuild the cache from the database
    pub async fn recover_cache(&self, ctx: &RequestContext) -> Result<usize> {
        Ok(self.repository.cache_recovery(ctx).await?)
    }
}
