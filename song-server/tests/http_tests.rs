//! Router tests
//!
//! Requests go through the full axum router with `oneshot`. The service runs
//! on an in-memory SQLite pool and the in-memory cache backend; the music info
//! provider is mocked.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use core_library::cache::{InMemoryBackend, KeyValueSongCache};
use core_library::db::create_test_pool;
use core_library::repositories::{CachedSongRepository, SqliteSongStore};
use core_library::{RequestContext, Song, SongInfo};
use core_metadata::{MetadataError, Result as MetadataResult, SongMetadataProvider};
use core_service::SongService;
use mockall::mock;
use serde_json::{json, Value};
use song_server::{app, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

mock! {
    pub Provider {}

    #[async_trait::async_trait]
    impl SongMetadataProvider for Provider {
        async fn fetch(&self, ctx: &RequestContext, info: &SongInfo) -> MetadataResult<Song>;
    }
}

fn known_songs() -> MockProvider {
    let mut provider = MockProvider::new();
    provider.expect_fetch().returning(|_, info| {
        if info.group == "Unknown" {
            return Err(MetadataError::BadRequest {
                status: 400,
                body: "no such song".to_string(),
            });
        }
        let text = if info.name == "Instrumental" {
            ""
        } else {
            "Verse 1\n\nVerse 2\n\nVerse 3"
        };
        Ok(Song::new(info.name.clone(), info.group.clone())
            .with_text(text)
            .with_release_date(NaiveDate::from_ymd_opt(1977, 10, 1).unwrap()))
    });
    provider
}

async fn test_app() -> Router {
    let pool = create_test_pool().await.unwrap();
    let store = Arc::new(SqliteSongStore::new(pool.clone()));
    let cache = Arc::new(KeyValueSongCache::new(InMemoryBackend::new()));
    let repository = Arc::new(CachedSongRepository::new(store, cache));
    let service = SongService::new(repository, Arc::new(known_songs()));
    app(AppState::new(service, pool, Duration::from_secs(5)))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn add(app: &Router, name: &str, group: &str) -> String {
    let (status, body) = send(app, "POST", "/songs", Some(json!({"name": name, "group": group}))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_add_get_delete() {
    let app = test_app().await;
    let id = add(&app, "Mr. Blue Sky", "Electric Light Orchestra").await;

    let (status, body) = send(&app, "GET", &format!("/songs/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Mr. Blue Sky");
    assert_eq!(body["group"], "Electric Light Orchestra");
    assert_eq!(body["release_date"], "1977-10-01");

    let (status, body) = send(&app, "DELETE", &format!("/songs/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "song deleted successfully");

    let (status, body) = send(&app, "GET", &format!("/songs/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "song not found");
}

#[tokio::test]
async fn test_add_validation_and_conflicts() {
    let app = test_app().await;

    let (status, body) = send(&app, "POST", "/songs", Some(json!({"name": "Hysteria"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name and group are required");

    let request = Request::builder()
        .method("POST")
        .uri("/songs")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/songs", Some(json!({"name": "X", "group": "Unknown"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    add(&app, "Hysteria", "Muse").await;
    let (status, body) = send(&app, "POST", "/songs", Some(json!({"name": "Hysteria", "group": "Muse"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "song already exists");
}

#[tokio::test]
async fn test_invalid_id_is_bad_request() {
    let app = test_app().await;
    for (method, uri) in [
        ("GET", "/songs/not-a-uuid"),
        ("DELETE", "/songs/not-a-uuid"),
        ("GET", "/songs/not-a-uuid/text"),
    ] {
        let (status, body) = send(&app, method, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
        assert_eq!(body["error"], "invalid song id");
    }
}

#[tokio::test]
async fn test_update_merges_fields() {
    let app = test_app().await;
    let id = add(&app, "Hysteria", "Muse").await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/songs/{id}"),
        Some(json!({"text": "It's bugging me\n\nGrating me", "link": "https://example.com/h"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Hysteria");
    assert_eq!(body["link"], "https://example.com/h");

    let (status, body) = send(&app, "GET", &format!("/songs/{id}/text"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"text": ["It's bugging me", "Grating me"]}));

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(&app, "PUT", &format!("/songs/{missing}"), Some(json!({"text": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_text_paging_and_empty_text() {
    let app = test_app().await;
    let id = add(&app, "Mr. Blue Sky", "Electric Light Orchestra").await;

    let (status, body) = send(&app, "GET", &format!("/songs/{id}/text?page=2&page_size=2"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], json!(["Verse 3"]));
    assert_eq!(body["total"], 3);
    assert_eq!(body["total_pages"], 2);

    let empty = add(&app, "Instrumental", "Band").await;
    let (status, body) = send(&app, "GET", &format!("/songs/{empty}/text"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "song has no text");
}

#[tokio::test]
async fn test_listing_filters_and_pages() {
    let app = test_app().await;
    for name in ["Hysteria", "Uprising", "Madness"] {
        add(&app, name, "Muse").await;
    }
    add(&app, "Mr. Blue Sky", "Electric Light Orchestra").await;

    let (status, body) = send(&app, "GET", "/songs?group=muse&page=1&page_size=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["items"][0]["name"], "Madness");

    let (_, body) = send(&app, "GET", "/songs?song=sky", None).await;
    assert_eq!(body["total"], 1);

    let (_, body) = send(&app, "GET", "/songs?release_date=1977-10-01", None).await;
    assert_eq!(body["total"], 4);

    for uri in ["/songs?page=0", "/songs?page_size=abc", "/songs?release_date=01.10.1977"] {
        let (status, _) = send(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn test_cache_recovery_and_health() {
    let app = test_app().await;
    add(&app, "Hysteria", "Muse").await;
    add(&app, "Madness", "Muse").await;

    let (status, body) = send(&app, "POST", "/cache/recovery", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recovered"], 2);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("pong"));
}
