use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    /// The upstream rejected the request; the song is unknown to it or the
    /// query was malformed. Retrying the same request will not help.
    #[error("Music info rejected the request (HTTP {status}): {body}")]
    BadRequest { status: u16, body: String },

    #[error("Music info returned HTTP {status}")]
    UnexpectedStatus { status: u16 },

    #[error("Music info request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode music info response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Invalid music info response: {0}")]
    InvalidResponse(String),

    #[error("Invalid music info URL: {0}")]
    InvalidUrl(String),

    #[error("Music info request cancelled")]
    Cancelled,

    #[error("Music info request exceeded its deadline")]
    DeadlineExceeded,
}

impl MetadataError {
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest { .. })
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
