//! Domain models for the song library
//!
//! The `Song` record is the single persisted entity. `SongSearch` is the
//! lookup-key projection used to address one song for read, update and
//! delete. Neither type validates itself; key resolution happens at the
//! adapter boundary through [`SongSearch::lookup`].

use crate::error::{LibraryError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Song
// =============================================================================

/// A song in the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Song {
    /// Identity assigned by the store on creation. `Uuid::nil()` until persisted.
    pub id: Uuid,
    pub name: String,
    #[sqlx(rename = "group_name")]
    pub group: String,
    /// Lyrics body, verses separated by blank lines
    pub text: String,
    pub link: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Song {
    /// Build an unpersisted song addressed by name and group.
    ///
    /// Timestamps are placeholders until the store assigns real ones.
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            name: name.into(),
            group: group.into(),
            text: String::new(),
            link: None,
            release_date: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_release_date(mut self, date: NaiveDate) -> Self {
        self.release_date = Some(date);
        self
    }

    /// Whether the store has assigned an identity to this record
    pub fn is_persisted(&self) -> bool {
        !self.id.is_nil()
    }

    /// Lookup key addressing this record by identity
    pub fn key(&self) -> SongSearch {
        SongSearch::from(self)
    }
}

// =============================================================================
// Lookup key
// =============================================================================

/// Lookup key addressing a single song.
///
/// A non-nil `id` addresses by identity; a nil `id` means `name` and `group`
/// together form the key. The type does not enforce that only one mode is
/// populated; `id` wins when both are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SongSearch {
    pub id: Uuid,
    pub name: String,
    pub group: String,
}

/// Name used by the metadata lookup for the same projection
pub type SongInfo = SongSearch;

/// Resolved addressing mode of a [`SongSearch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongLookup<'a> {
    Id(Uuid),
    NameGroup { name: &'a str, group: &'a str },
}

impl SongSearch {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn by_name(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            name: name.into(),
            group: group.into(),
        }
    }

    /// Resolve which addressing mode this key uses.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` when the id is nil and either `name` or `group`
    /// is empty.
    pub fn lookup(&self) -> Result<SongLookup<'_>> {
        if !self.id.is_nil() {
            return Ok(SongLookup::Id(self.id));
        }
        if self.name.is_empty() || self.group.is_empty() {
            return Err(LibraryError::InvalidKey(format!(
                "song key needs an id or both name and group (name={:?}, group={:?})",
                self.name, self.group
            )));
        }
        Ok(SongLookup::NameGroup {
            name: &self.name,
            group: &self.group,
        })
    }
}

impl From<&Song> for SongSearch {
    fn from(song: &Song) -> Self {
        Self {
            id: song.id,
            name: song.name.clone(),
            group: song.group.clone(),
        }
    }
}

impl fmt::Display for SongSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_nil() {
            write!(f, "{} - {}", self.group, self.name)
        } else {
            write!(f, "{}", self.id)
        }
    }
}

// =============================================================================
// Filter
// =============================================================================

/// Filter for listing songs. Absent or empty fields are not filtered on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongFilter {
    /// Case-insensitive substring of the song name
    pub name: Option<String>,
    /// Case-insensitive substring of the group name
    pub group: Option<String>,
    /// Exact release date
    pub release_date: Option<NaiveDate>,
}

impl SongFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn release_date(mut self, date: NaiveDate) -> Self {
        self.release_date = Some(date);
        self
    }

    pub(crate) fn name_pattern(&self) -> Option<&str> {
        self.name.as_deref().filter(|s| !s.is_empty())
    }

    pub(crate) fn group_pattern(&self) -> Option<&str> {
        self.group.as_deref().filter(|s| !s.is_empty())
    }

    /// True when no field restricts the result set
    pub fn is_empty(&self) -> bool {
        self.name_pattern().is_none() && self.group_pattern().is_none() && self.release_date.is_none()
    }
}
