//! # Repository Layer
//!
//! - [`SongStore`] is the durable store contract; [`SqliteSongStore`] implements it with sqlx
//! - [`SongRepository`] is what the service talks to; [`CachedSongRepository`]
//!   composes a store with a [`crate::cache::SongCache`]
//! - [`Page`] / [`PageRequest`] carry page-number pagination

pub mod pagination;
pub mod song;
pub mod store;

pub use pagination::{Page, PageRequest, DEFAULT_PAGE_SIZE};
pub use song::{CachedSongRepository, SongRepository};
pub use store::{SongStore, SqliteSongStore};
