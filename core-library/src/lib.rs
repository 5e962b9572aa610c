//! # Song Library Core
//!
//! Owns the song data and keeps a key-value cache coherent with it.
//!
//! ## Overview
//!
//! - SQLite schema, migrations and connection pooling ([`db`])
//! - Durable store adapter with filtered listing ([`repositories::store`])
//! - Song cache over Redis or an in-process map ([`cache`])
//! - Read-through / write-through repository ([`repositories::song`])
//! - Per-request cancellation, deadline and tracing span ([`context`])

pub mod cache;
pub mod context;
pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use cache::{CacheBackend, InMemoryBackend, KeyValueSongCache, RedisBackend, SongCache};
pub use context::{Interrupted, RequestContext};
pub use error::{ErrorKind, LibraryError, Result};
pub use models::{Song, SongFilter, SongInfo, SongLookup, SongSearch};
pub use repositories::{
    CachedSongRepository, Page, PageRequest, SongRepository, SongStore, SqliteSongStore,
};
