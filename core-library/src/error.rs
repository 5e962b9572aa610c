use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Entity not found: {entity_type} with key {key}")]
    NotFound { entity_type: String, key: String },

    #[error("Entity already exists ({op})")]
    AlreadyExists { op: &'static str },

    #[error("Invalid lookup key: {0}")]
    InvalidKey(String),

    #[error("Corrupted cache payload ({op}): {message}")]
    Integrity { op: &'static str, message: String },

    #[error("Database error ({op}): {source}")]
    Database {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Cache error ({op}): {source}")]
    Cache {
        op: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Operation cancelled: {op}")]
    Cancelled { op: &'static str },

    #[error("Deadline exceeded: {op}")]
    DeadlineExceeded { op: &'static str },
}

/// Coarse classification of a [`LibraryError`], compared by identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidKey,
    Integrity,
    Backend,
    Cancelled,
}

impl LibraryError {
    pub fn not_found(entity_type: &str, key: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            key: key.to_string(),
        }
    }

    pub fn database(op: &'static str, source: sqlx::Error) -> Self {
        Self::Database { op, source }
    }

    pub fn cache(op: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Cache {
            op,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Database { .. } | Self::Cache { .. } | Self::Migration(_) => ErrorKind::Backend,
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_classified() {
        assert_eq!(
            LibraryError::not_found("song", "abc").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LibraryError::database("song.read", sqlx::Error::RowNotFound).kind(),
            ErrorKind::Backend
        );
        assert_eq!(
            LibraryError::cache("cache.get", "connection refused").kind(),
            ErrorKind::Backend
        );
        assert_eq!(
            LibraryError::DeadlineExceeded { op: "song.read" }.kind(),
            ErrorKind::Cancelled
        );
    }

    #[test]
    fn test_operation_tag_in_message() {
        let err = LibraryError::cache("cache.set", "broken pipe");
        assert_eq!(err.to_string(), "Cache error (cache.set): broken pipe");
    }
}
