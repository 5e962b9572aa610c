//! # Song Metadata
//!
//! Enriches new songs with lyrics, link and release date from the external
//! music info service.
//!
//! - [`SongMetadataProvider`] is the lookup contract used by the service layer
//! - [`MusicInfoClient`] implements it over HTTP with reqwest

pub mod error;
pub mod music_info;
pub mod provider;

pub use error::{MetadataError, Result};
pub use music_info::{MusicInfoClient, MusicInfoConfig};
pub use provider::SongMetadataProvider;
