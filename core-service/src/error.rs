use core_library::{ErrorKind, LibraryError};
use core_metadata::MetadataError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error(transparent)]
    Library(#[from] LibraryError),

    /// The music info service does not know the requested song
    #[error("Bad request from music info: {0}")]
    UpstreamBadRequest(#[source] MetadataError),

    #[error("Failed to fetch song info: {0}")]
    Upstream(#[source] MetadataError),

    #[error("Song text is empty")]
    EmptyText,

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

/// How a [`CoreError`] should be reported to a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    NotFound,
    AlreadyExists,
    InvalidInput,
    UpstreamBadRequest,
    Upstream,
    EmptyText,
    Cancelled,
    Internal,
}

impl CoreError {
    pub fn invalid_input(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ServiceErrorKind {
        match self {
            Self::Library(e) => match e.kind() {
                ErrorKind::NotFound => ServiceErrorKind::NotFound,
                ErrorKind::AlreadyExists => ServiceErrorKind::AlreadyExists,
                ErrorKind::InvalidKey => ServiceErrorKind::InvalidInput,
                ErrorKind::Cancelled => ServiceErrorKind::Cancelled,
                ErrorKind::Integrity | ErrorKind::Backend => ServiceErrorKind::Internal,
            },
            Self::UpstreamBadRequest(_) => ServiceErrorKind::UpstreamBadRequest,
            Self::Upstream(MetadataError::Cancelled | MetadataError::DeadlineExceeded) => {
                ServiceErrorKind::Cancelled
            }
            Self::Upstream(_) => ServiceErrorKind::Upstream,
            Self::EmptyText => ServiceErrorKind::EmptyText,
            Self::InvalidInput { .. } => ServiceErrorKind::InvalidInput,
            Self::InitializationFailed(_) => ServiceErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ServiceErrorKind::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind() == ServiceErrorKind::AlreadyExists
    }
}

impl From<MetadataError> for CoreError {
    fn from(err: MetadataError) -> Self {
        if err.is_bad_request() {
            Self::UpstreamBadRequest(err)
        } else {
            Self::Upstream(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
