//! # Song Library HTTP Server
//!
//! axum delivery layer over [`core_service::SongService`].
//!
//! | Method | Path | |
//! |--------|------|-|
//! | POST   | `/songs`             | enrich from music info and store, 201 |
//! | GET    | `/songs`             | filtered listing (`name`, `group`, `release_date`, `page`, `page_size`) |
//! | GET    | `/songs/{id}`        | one song |
//! | PUT    | `/songs/{id}`        | partial update |
//! | DELETE | `/songs/{id}`        | delete |
//! | GET    | `/songs/{id}/text`   | verses, optionally paged |
//! | POST   | `/cache/recovery`    | rebuild the cache from the database |
//! | GET    | `/health`, `/ping`   | readiness and liveness |
//!
//! Errors are `{"error": "..."}`; see [`error::ApiError`] for the status mapping.

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use core_service::SongService;
use sqlx::SqlitePool;
use std::time::Duration;

pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub service: SongService,
    pub pool: SqlitePool,
    /// Deadline given to each request's context
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(service: SongService, pool: SqlitePool, request_timeout: Duration) -> Self {
        Self {
            service,
            pool,
            request_timeout,
        }
    }
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::songs::router())
        .merge(routes::cache::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::request_context,
        ))
        .merge(routes::health::router())
        .with_state(state)
}
