//! Metadata lookup contract

use crate::error::Result;
use async_trait::async_trait;
use core_library::{RequestContext, Song, SongInfo};

/// External source of song details, consulted when a song is added.
#[async_trait]
pub trait SongMetadataProvider: Send + Sync {
    /// Fetch the full record for `info.name` / `info.group`.
    ///
    /// The returned song is unpersisted: its id is nil and its timestamps are
    /// placeholders.
    ///
    /// # Errors
    /// - `BadRequest` when the upstream rejects the lookup
    async fn fetch(&self, ctx: &RequestContext, info: &SongInfo) -> Result<Song>;
}
