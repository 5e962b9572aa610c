//! Durable song store trait and SQLite implementation

use crate::context::RequestContext;
use crate::error::{LibraryError, Result};
use crate::models::{Song, SongFilter, SongLookup, SongSearch};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Durable store interface for songs.
///
/// The store is the authority for identity and timestamps.
#[async_trait]
pub trait SongStore: Send + Sync {
    /// Persist a new song.
    ///
    /// Assigns a fresh id and sets `created_at`/`updated_at`; the populated
    /// record is returned.
    ///
    /// # Errors
    /// - `AlreadyExists` if a song with the same name and group is stored
    async fn create(&self, ctx: &RequestContext, song: Song) -> Result<Song>;

    /// Exact lookup by id or by name and group
    async fn read(&self, ctx: &RequestContext, key: &SongSearch) -> Result<Song>;

    /// Replace every mutable field of the row matching `key`.
    ///
    /// `updated_at` is refreshed. The returned record is the row as stored.
    ///
    /// # Errors
    /// - `NotFound` if no row matches
    /// - `AlreadyExists` if the new name and group collide with another song
    async fn update(&self, ctx: &RequestContext, key: &SongSearch, song: Song) -> Result<Song>;

    /// Remove the row matching `key` and return it as it was stored.
    ///
    /// # Errors
    /// - `NotFound` if no row matches
    async fn delete(&self, ctx: &RequestContext, key: &SongSearch) -> Result<Song>;

    /// List songs matching `filter`, newest first.
    ///
    /// A `limit` of zero returns every matching row and ignores `offset`.
    async fn read_all_with_filter(
        &self,
        ctx: &RequestContext,
        filter: &SongFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Song>>;

    /// Number of songs matching `filter`
    async fn count_with_filter(&self, ctx: &RequestContext, filter: &SongFilter) -> Result<u64>;
}

/// SQLite implementation of SongStore
pub struct SqliteSongStore {
    pool: SqlitePool,
}

impl SqliteSongStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_write_error(op: &'static str, err: sqlx::Error) -> LibraryError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            LibraryError::AlreadyExists { op }
        }
        _ => LibraryError::database(op, err),
    }
}

/// `%value%` with LIKE wildcards in `value` escaped by `\`
fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &SongFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(name) = filter.name_pattern() {
        builder
            .push(" AND LOWER(name) LIKE LOWER(")
            .push_bind(contains_pattern(name))
            .push(") ESCAPE '\\'");
    }
    if let Some(group) = filter.group_pattern() {
        builder
            .push(" AND LOWER(group_name) LIKE LOWER(")
            .push_bind(contains_pattern(group))
            .push(") ESCAPE '\\'");
    }
    if let Some(date) = filter.release_date {
        builder.push(" AND release_date = ").push_bind(date);
    }
}

#[async_trait]
impl SongStore for SqliteSongStore {
    #[instrument(skip(self, ctx, song), fields(song_name = %song.name, group_name = %song.group))]
    async fn create(&self, ctx: &RequestContext, song: Song) -> Result<Song> {
        const OP: &str = "song_store.create";
        ctx.run(OP, async {
            let now = Utc::now();
            let song = Song {
                id: Uuid::new_v4(),
                created_at: now,
                updated_at: now,
                ..song
            };

            query(
                r#"
                INSERT INTO songs (id, name, group_name, text, link, release_date, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(song.id)
            .bind(&song.name)
            .bind(&song.group)
            .bind(&song.text)
            .bind(&song.link)
            .bind(song.release_date)
            .bind(song.created_at)
            .bind(song.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(OP, e))?;

            debug!(song_id = %song.id, "Song stored");
            Ok(song)
        })
        .await
    }

    #[instrument(skip(self, ctx), fields(key = %key))]
    async fn read(&self, ctx: &RequestContext, key: &SongSearch) -> Result<Song> {
        const OP: &str = "song_store.read";
        let lookup = key.lookup()?;
        ctx.run(OP, async {
            let song = match lookup {
                SongLookup::Id(id) => {
                    query_as::<_, Song>("SELECT * FROM songs WHERE id = ?")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await
                }
                SongLookup::NameGroup { name, group } => {
                    query_as::<_, Song>("SELECT * FROM songs WHERE name = ? AND group_name = ?")
                        .bind(name)
                        .bind(group)
                        .fetch_optional(&self.pool)
                        .await
                }
            }
            .map_err(|e| LibraryError::database(OP, e))?;

            song.ok_or_else(|| LibraryError::not_found("song", key))
        })
        .await
    }

    #[instrument(skip(self, ctx, song), fields(key = %key))]
    async fn update(&self, ctx: &RequestContext, key: &SongSearch, song: Song) -> Result<Song> {
        const OP: &str = "song_store.update";
        let lookup = key.lookup()?;
        ctx.run(OP, async {
            let mut builder = QueryBuilder::<Sqlite>::new("UPDATE songs SET name = ");
            builder
                .push_bind(&song.name)
                .push(", group_name = ")
                .push_bind(&song.group)
                .push(", text = ")
                .push_bind(&song.text)
                .push(", link = ")
                .push_bind(&song.link)
                .push(", release_date = ")
                .push_bind(song.release_date)
                .push(", updated_at = ")
                .push_bind(Utc::now());

            match lookup {
                SongLookup::Id(id) => {
                    builder.push(" WHERE id = ").push_bind(id);
                }
                SongLookup::NameGroup { name, group } => {
                    builder
                        .push(" WHERE name = ")
                        .push_bind(name)
                        .push(" AND group_name = ")
                        .push_bind(group);
                }
            }
            builder.push(" RETURNING *");

            let updated = builder
                .build_query_as::<Song>()
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_write_error(OP, e))?
                .ok_or_else(|| LibraryError::not_found("song", key))?;

            debug!(song_id = %updated.id, "Song updated");
            Ok(updated)
        })
        .await
    }

    #[instrument(skip(self, ctx), fields(key = %key))]
    async fn delete(&self, ctx: &RequestContext, key: &SongSearch) -> Result<Song> {
        const OP: &str = "song_store.delete";
        let lookup = key.lookup()?;
        ctx.run(OP, async {
            let deleted = match lookup {
                SongLookup::Id(id) => {
                    query_as::<_, Song>("DELETE FROM songs WHERE id = ? RETURNING *")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await
                }
                SongLookup::NameGroup { name, group } => {
                    query_as::<_, Song>(
                        "DELETE FROM songs WHERE name = ? AND group_name = ? RETURNING *",
                    )
                    .bind(name)
                    .bind(group)
                    .fetch_optional(&self.pool)
                    .await
                }
            }
            .map_err(|e| LibraryError::database(OP, e))?
            .ok_or_else(|| LibraryError::not_found("song", key))?;

            debug!(song_id = %deleted.id, "Song deleted");
            Ok(deleted)
        })
        .await
    }

    #[instrument(skip(self, ctx))]
    async fn read_all_with_filter(
        &self,
        ctx: &RequestContext,
        filter: &SongFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Song>> {
        const OP: &str = "song_store.read_all_with_filter";
        ctx.run(OP, async {
            let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM songs");
            push_filter(&mut builder, filter);
            builder.push(" ORDER BY created_at DESC, rowid DESC");
            if limit > 0 {
                builder
                    .push(" LIMIT ")
                    .push_bind(i64::from(limit))
                    .push(" OFFSET ")
                    .push_bind(i64::from(offset));
            }

            let songs = builder
                .build_query_as::<Song>()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| LibraryError::database(OP, e))?;

            debug!(count = songs.len(), "Songs listed");
            Ok(songs)
        })
        .await
    }

    #[instrument(skip(self, ctx))]
    async fn count_with_filter(&self, ctx: &RequestContext, filter: &SongFilter) -> Result<u64> {
        const OP: &str = "song_store.count_with_filter";
        ctx.run(OP, async {
            let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM songs");
            push_filter(&mut builder, filter);

            let (count,): (i64,) = builder
                .build_query_as()
                .fetch_one(&self.pool)
                .await
                .map_err(|e| LibraryError::database(OP, e))?;

            Ok(count.max(0) as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;

    async fn create_test_store() -> SqliteSongStore {
        SqliteSongStore::new(create_test_pool().await.unwrap())
    }

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    fn hysteria() -> Song {
        Song::new("Hysteria", "Muse")
            .with_text("It's bugging me\n\nGrating me")
            .with_link("https://example.com/hysteria")
            .with_release_date(NaiveDate::from_ymd_opt(2003, 12, 1).unwrap())
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("abc"), "%abc%");
        assert_eq!(contains_pattern("100%_\\"), "%100\\%\\_\\\\%");
    }

    #[tokio::test]
    async fn test_create_assigns_identity_and_timestamps() {
        let store = create_test_store().await;
        let song = store.create(&ctx(), hysteria()).await.unwrap();

        assert!(song.is_persisted());
        assert_eq!(song.created_at, song.updated_at);
        assert_eq!(song.name, "Hysteria");

        let by_id = store.read(&ctx(), &SongSearch::by_id(song.id)).await.unwrap();
        assert_eq!(by_id, song);

        let by_name = store
            .read(&ctx(), &SongSearch::by_name("Hysteria", "Muse"))
            .await
            .unwrap();
        assert_eq!(by_name, song);
    }

    #[tokio::test]
    async fn test_create_duplicate_is_already_exists() {
        let store = create_test_store().await;
        store.create(&ctx(), hysteria()).await.unwrap();

        let err = store.create(&ctx(), hysteria()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let store = create_test_store().await;
        let err = store
            .read(&ctx(), &SongSearch::by_id(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_read_with_invalid_key() {
        let store = create_test_store().await;
        let err = store
            .read(&ctx(), &SongSearch::by_name("", "Muse"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidKey);
    }

    #[tokio::test]
    async fn test_update_replaces_fields_and_refreshes_timestamp() {
        let store = create_test_store().await;
        let original = store.create(&ctx(), hysteria()).await.unwrap();

        let mut replacement = original.clone();
        replacement.text = "new lyrics".to_string();
        replacement.link = None;

        let updated = store
            .update(&ctx(), &SongSearch::by_id(original.id), replacement)
            .await
            .unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at >= original.updated_at);
        assert_eq!(updated.text, "new lyrics");
        assert_eq!(updated.link, None);

        let stored = store.read(&ctx(), &original.key()).await.unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = create_test_store().await;
        let err = store
            .update(&ctx(), &SongSearch::by_id(Uuid::new_v4()), hysteria())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = create_test_store().await;
        let song = store.create(&ctx(), hysteria()).await.unwrap();

        let deleted = store.delete(&ctx(), &SongSearch::by_id(song.id)).await.unwrap();
        assert_eq!(deleted, song);

        let err = store.delete(&ctx(), &SongSearch::by_id(song.id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_by_name_returns_removed_row() {
        let store = create_test_store().await;
        let song = store.create(&ctx(), hysteria()).await.unwrap();

        let deleted = store
            .delete(&ctx(), &SongSearch::by_name(&song.name, &song.group))
            .await
            .unwrap();
        assert_eq!(deleted.id, song.id);
        assert!(store.read(&ctx(), &song.key()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_filter_by_name_is_case_insensitive_substring() {
        let store = create_test_store().await;
        store.create(&ctx(), hysteria()).await.unwrap();
        store
            .create(&ctx(), Song::new("hysteria (live)", "Muse"))
            .await
            .unwrap();
        store
            .create(&ctx(), Song::new("Starlight", "Muse"))
            .await
            .unwrap();

        let songs = store
            .read_all_with_filter(&ctx(), &SongFilter::new().name("HYSTERIA"), 10, 0)
            .await
            .unwrap();

        let names: Vec<_> = songs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["hysteria (live)", "Hysteria"]);
    }

    #[tokio::test]
    async fn test_filter_by_group_and_release_date() {
        let store = create_test_store().await;
        store.create(&ctx(), hysteria()).await.unwrap();
        store
            .create(&ctx(), Song::new("Mr. Blue Sky", "ELO"))
            .await
            .unwrap();

        let by_group = store
            .read_all_with_filter(&ctx(), &SongFilter::new().group("el"), 0, 0)
            .await
            .unwrap();
        assert_eq!(by_group.len(), 1);
        assert_eq!(by_group[0].group, "ELO");

        let by_date = store
            .read_all_with_filter(
                &ctx(),
                &SongFilter::new().release_date(NaiveDate::from_ymd_opt(2003, 12, 1).unwrap()),
                0,
                0,
            )
            .await
            .unwrap();
        assert_eq!(by_date.len(), 1);
        assert_eq!(by_date[0].name, "Hysteria");
    }

    #[tokio::test]
    async fn test_filter_does_not_treat_percent_as_wildcard() {
        let store = create_test_store().await;
        store
            .create(&ctx(), Song::new("100% Pure Love", "Crystal Waters"))
            .await
            .unwrap();
        store.create(&ctx(), Song::new("1000 Miles", "Someone")).await.unwrap();

        let songs = store
            .read_all_with_filter(&ctx(), &SongFilter::new().name("100%"), 0, 0)
            .await
            .unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].name, "100% Pure Love");
    }

    #[tokio::test]
    async fn test_pagination_newest_first() {
        let store = create_test_store().await;
        for i in 0..5 {
            store
                .create(&ctx(), Song::new(format!("Song {}", i), "Band"))
                .await
                .unwrap();
        }

        let filter = SongFilter::new();
        let first = store.read_all_with_filter(&ctx(), &filter, 2, 0).await.unwrap();
        let second = store.read_all_with_filter(&ctx(), &filter, 2, 2).await.unwrap();
        let all = store.read_all_with_filter(&ctx(), &filter, 0, 3).await.unwrap();

        assert_eq!(
            first.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["Song 4", "Song 3"]
        );
        assert_eq!(
            second.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["Song 2", "Song 1"]
        );
        assert_eq!(all.len(), 5, "limit 0 ignores offset");
        assert_eq!(store.count_with_filter(&ctx(), &filter).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_write() {
        let store = create_test_store().await;
        let cancelled = RequestContext::background();
        cancelled.cancel();

        let err = store.create(&cancelled, hysteria()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(store.count_with_filter(&ctx(), &SongFilter::new()).await.unwrap(), 0);
    }
}
