//! HTTP error responses
//!
//! Every failure is rendered as `{"error": "<message>"}` with a status derived
//! from the service error kind. Internal details are logged, not returned.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use core_service::{CoreError, ServiceErrorKind};
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: &self.message })).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err.kind() {
            ServiceErrorKind::NotFound => {
                info!(error = %err, "Song not found");
                Self::new(StatusCode::NOT_FOUND, "song not found")
            }
            ServiceErrorKind::AlreadyExists => {
                info!(error = %err, "Song already exists");
                Self::new(StatusCode::CONFLICT, "song already exists")
            }
            ServiceErrorKind::InvalidInput => {
                info!(error = %err, "Invalid input");
                Self::bad_request(err.to_string())
            }
            ServiceErrorKind::UpstreamBadRequest => {
                info!(error = %err, "Music info does not know the song");
                Self::bad_request("song not found in music info")
            }
            ServiceErrorKind::EmptyText => {
                info!("Song has no text");
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "song has no text")
            }
            ServiceErrorKind::Upstream => {
                warn!(error = %err, "Music info lookup failed");
                Self::new(StatusCode::BAD_GATEWAY, "music info unavailable")
            }
            ServiceErrorKind::Cancelled => {
                warn!(error = %err, "Request cancelled or timed out");
                Self::new(StatusCode::GATEWAY_TIMEOUT, "request timed out")
            }
            ServiceErrorKind::Internal => {
                error!(error = %err, "Request failed");
                Self::internal()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        info!(error = %rejection, "Rejected request body");
        Self::bad_request("invalid request")
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        info!(error = %rejection, "Rejected query string");
        Self::bad_request("invalid query parameters")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::LibraryError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                CoreError::Library(LibraryError::not_found("Song", "x")),
                StatusCode::NOT_FOUND,
            ),
            (
                CoreError::Library(LibraryError::AlreadyExists { op: "create_song" }),
                StatusCode::CONFLICT,
            ),
            (
                CoreError::Library(LibraryError::InvalidKey("empty".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (CoreError::EmptyText, StatusCode::UNPROCESSABLE_ENTITY),
            (
                CoreError::Library(LibraryError::Migration("boom".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = ApiError::from(CoreError::Library(LibraryError::Integrity {
            op: "cache_get",
            message: "bad json at line 1".to_string(),
        }));
        assert_eq!(err.message(), "internal error");
    }
}
