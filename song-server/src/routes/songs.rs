//! `/songs` endpoints

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use core_library::repositories::{Page, PageRequest, DEFAULT_PAGE_SIZE};
use core_library::{RequestContext, Song, SongFilter, SongInfo, SongSearch};
use core_service::SongUpdate;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/songs", get(list_songs).post(add_song))
        .route(
            "/songs/:id",
            get(get_song).put(update_song).delete(delete_song),
        )
        .route("/songs/:id/text", get(get_song_text))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddSongRequest {
    pub name: String,
    pub group: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateSongRequest {
    pub name: Option<String>,
    pub group: Option<String>,
    pub text: Option<String>,
    pub link: Option<String>,
    pub release_date: Option<NaiveDate>,
}

impl From<UpdateSongRequest> for SongUpdate {
    fn from(req: UpdateSongRequest) -> Self {
        SongUpdate {
            name: req.name,
            group: req.group,
            text: req.text,
            link: req.link,
            release_date: req.release_date,
        }
    }
}

/// Raw listing parameters; parsed by hand so each bad value gets its own message
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    #[serde(alias = "song")]
    pub name: Option<String>,
    pub group: Option<String>,
    pub release_date: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TextParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("invalid song id"))
}

fn parse_positive(raw: Option<&str>, name: &str) -> ApiResult<Option<u32>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => match value.parse::<u32>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ApiError::bad_request(format!("invalid {} parameter", name))),
        },
    }
}

fn page_request(page: Option<&str>, page_size: Option<&str>) -> ApiResult<PageRequest> {
    Ok(PageRequest::new(
        parse_positive(page, "page")?.unwrap_or(1),
        parse_positive(page_size, "page_size")?.unwrap_or(DEFAULT_PAGE_SIZE),
    ))
}

impl ListParams {
    fn filter(&self) -> ApiResult<SongFilter> {
        let mut filter = SongFilter {
            name: self.name.clone().filter(|s| !s.is_empty()),
            group: self.group.clone().filter(|s| !s.is_empty()),
            release_date: None,
        };
        if let Some(raw) = self.release_date.as_deref().filter(|s| !s.is_empty()) {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ApiError::bad_request("invalid release_date parameter"))?;
            filter = filter.release_date(date);
        }
        Ok(filter)
    }
}

async fn add_song(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<AddSongRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Song>)> {
    let Json(req) = payload?;
    if req.name.trim().is_empty() || req.group.trim().is_empty() {
        return Err(ApiError::bad_request("name and group are required"));
    }

    let song = state
        .service
        .add(&ctx, &SongInfo::by_name(req.name, req.group))
        .await?;
    info!(song_id = %song.id, "Song created");
    Ok((StatusCode::CREATED, Json(song)))
}

async fn list_songs(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Page<Song>>> {
    let Query(params) = params?;
    let filter = params.filter()?;
    let page = page_request(params.page.as_deref(), params.page_size.as_deref())?;

    let songs = state.service.get_all_with_filter(&ctx, &filter, page).await?;
    Ok(Json(songs))
}

async fn get_song(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Song>> {
    let id = parse_id(&id)?;
    let song = state.service.get(&ctx, &SongSearch::by_id(id)).await?;
    Ok(Json(song))
}

async fn update_song(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateSongRequest>, JsonRejection>,
) -> ApiResult<Json<Song>> {
    let id = parse_id(&id)?;
    let Json(req) = payload?;

    let song = state
        .service
        .update(&ctx, &SongSearch::by_id(id), req.into())
        .await?;
    Ok(Json(song))
}

async fn delete_song(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    state.service.delete(&ctx, &SongSearch::by_id(id)).await?;
    info!(song_id = %id, "Song deleted");
    Ok(Json(MessageResponse {
        message: "song deleted successfully".to_string(),
    }))
}

/// All verses, or one page of them when `page` or `page_size` is given
async fn get_song_text(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    params: Result<Query<TextParams>, QueryRejection>,
) -> ApiResult<Json<TextResponse>> {
    let id = parse_id(&id)?;
    let Query(params) = params?;
    let key = SongSearch::by_id(id);

    if params.page.is_none() && params.page_size.is_none() {
        let text = state.service.get_paginated_text(&ctx, &key).await?;
        return Ok(Json(TextResponse {
            text,
            page: None,
            total_pages: None,
            total: None,
        }));
    }

    let request = page_request(params.page.as_deref(), params.page_size.as_deref())?;
    let page = state.service.get_text_page(&ctx, &key, request).await?;
    Ok(Json(TextResponse {
        text: page.items,
        page: Some(page.page),
        total_pages: Some(page.total_pages),
        total: Some(page.total),
    }))
}
